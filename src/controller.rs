//! Application state and the command/effect state machine.
//!
//! `Controller` owns every piece of mutable state (catalog, selection, form
//! values, history, what is currently shown). User intent arrives as a
//! [`Command`], network completions as an [`Event`]. Handling a command
//! never performs I/O; it returns the [`Effect`]s a session has to run.
//!
//! Overlapping renders: each generate gets a fresh request id and only the
//! latest one is tracked. A completion carrying an older id is dropped, so
//! the most recently issued request wins whatever order replies arrive in.

use crate::catalog::{Catalog, Template};
use crate::form::{FormSpec, FormValues, Locale};
use crate::history::{History, HistoryEntry};
use crate::render::{build_render_url, RenderedImage};
use crate::{ClientConfig, Error, Result};

/// Where the user is in the browse/select/render flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Browsing,
    Selected,
    Generating,
    Shown,
    Failed,
}

/// Loading state of the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogStatus {
    Empty,
    Loading,
    Loaded,
    Failed,
}

/// User intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open the catalog browser, loading the catalog on first use
    OpenCatalog,
    CloseCatalog,
    Search(String),
    /// Select a template by id; closes the browser
    Select(String),
    SetField { key: String, value: String },
    Generate,
    Regenerate,
    /// Show a history entry again without a new request
    Recall(usize),
}

/// Completion of an effect
#[derive(Debug)]
pub enum Event {
    CatalogLoaded(Result<Catalog>),
    RenderFinished {
        request_id: u64,
        result: Result<RenderedImage>,
    },
}

/// I/O the controller asks its session to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchCatalog,
    FetchImage { request_id: u64, url: String },
}

/// The image currently on display
#[derive(Debug, Clone)]
pub enum Shown {
    /// Freshly rendered, bytes available
    Rendered(RenderedImage),
    /// Re-displayed from history, only the URL is known
    Recalled(HistoryEntry),
}

impl Shown {
    pub fn url(&self) -> &str {
        match self {
            Shown::Rendered(img) => &img.url,
            Shown::Recalled(entry) => &entry.url,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingRender {
    request_id: u64,
    name: String,
}

pub struct Controller {
    render_endpoint: String,
    locale: Locale,

    catalog: Catalog,
    catalog_status: CatalogStatus,
    search: String,

    selected: Option<Template>,
    form: FormSpec,
    values: FormValues,

    phase: Phase,
    // phase to restore when the browser closes
    resume: Phase,

    pending: Option<PendingRender>,
    next_request_id: u64,
    shown: Option<Shown>,
    history: History,

    notice: Option<&'static str>,
    last_error: Option<Error>,
}

impl Controller {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            render_endpoint: config.render_endpoint.clone(),
            locale: config.locale,
            catalog: Catalog::default(),
            catalog_status: CatalogStatus::Empty,
            search: String::new(),
            selected: None,
            form: FormSpec::default(),
            values: FormValues::new(),
            phase: Phase::Idle,
            resume: Phase::Idle,
            pending: None,
            next_request_id: 1,
            shown: None,
            history: History::new(),
            notice: None,
            last_error: None,
        }
    }

    /// Apply a command and return the I/O it requires.
    pub fn handle(&mut self, command: Command) -> Result<Vec<Effect>> {
        log::debug!("command {:?} in phase {:?}", command, self.phase);
        match command {
            Command::OpenCatalog => Ok(self.open_catalog()),
            Command::CloseCatalog => {
                if self.phase == Phase::Browsing {
                    self.phase = self.resume;
                }
                Ok(vec![])
            }
            Command::Search(term) => {
                self.search = term;
                Ok(vec![])
            }
            Command::Select(id) => {
                self.select(&id)?;
                Ok(vec![])
            }
            Command::SetField { key, value } => {
                self.set_field(&key, value)?;
                Ok(vec![])
            }
            Command::Generate | Command::Regenerate => self.generate().map(|e| vec![e]),
            Command::Recall(index) => {
                let entry = self
                    .history
                    .get(index)
                    .cloned()
                    .ok_or_else(|| Error::Other(format!("no history entry at {}", index)))?;
                self.shown = Some(Shown::Recalled(entry));
                self.notice = None;
                self.settle(Phase::Shown);
                Ok(vec![])
            }
        }
    }

    /// Apply a network completion.
    pub fn apply(&mut self, event: Event) {
        match event {
            Event::CatalogLoaded(result) => self.catalog_loaded(result),
            Event::RenderFinished { request_id, result } => {
                self.render_finished(request_id, result)
            }
        }
    }

    fn open_catalog(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Browsing {
            self.resume = self.phase;
            self.phase = Phase::Browsing;
        }
        if self.catalog.is_empty() && self.catalog_status != CatalogStatus::Loading {
            self.catalog_status = CatalogStatus::Loading;
            self.notice = Some(self.labels().loading);
            return vec![Effect::FetchCatalog];
        }
        vec![]
    }

    fn catalog_loaded(&mut self, result: Result<Catalog>) {
        if self.catalog_status != CatalogStatus::Loading {
            log::debug!("ignoring catalog completion in status {:?}", self.catalog_status);
            return;
        }
        match result {
            Ok(catalog) => {
                log::info!("catalog loaded with {} templates", catalog.len());
                self.catalog = catalog;
                self.catalog_status = CatalogStatus::Loaded;
                self.notice = None;
            }
            Err(e) => {
                log::warn!("catalog load failed: {}", e);
                self.catalog_status = CatalogStatus::Failed;
                self.notice = Some(self.labels().load_failed);
                self.last_error = Some(e);
            }
        }
    }

    fn select(&mut self, id: &str) -> Result<()> {
        let template = self
            .catalog
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownTemplate(id.to_string()))?;

        self.form = FormSpec::for_template(&template, self.locale);
        self.values = self.form.initial_values();
        self.selected = Some(template);
        self.shown = None;
        // a render for the previous template must not land on this one
        self.pending = None;
        self.notice = if self.form.is_empty() {
            Some(self.labels().no_params)
        } else {
            None
        };
        self.phase = Phase::Selected;
        self.resume = Phase::Selected;
        Ok(())
    }

    fn set_field(&mut self, key: &str, value: String) -> Result<()> {
        if self.selected.is_none() {
            return Err(Error::NoTemplateSelected);
        }
        if !self.form.fields.iter().any(|f| f.key == key) {
            return Err(Error::UnknownField(key.to_string()));
        }
        self.values.set(key, value);
        Ok(())
    }

    /// Render URL for the current selection and form values.
    pub fn render_url(&self) -> Result<String> {
        let template = self.selected.as_ref().ok_or(Error::NoTemplateSelected)?;
        build_render_url(&self.render_endpoint, template, &self.values)
    }

    fn generate(&mut self) -> Result<Effect> {
        let url = self.render_url()?;
        let name = self
            .selected
            .as_ref()
            .map(|t| t.name.clone())
            .unwrap_or_default();

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        if let Some(prev) = self.pending.replace(PendingRender { request_id, name }) {
            log::debug!("render {} superseded by {}", prev.request_id, request_id);
        }

        self.shown = None;
        self.notice = Some(self.labels().generating);
        self.settle(Phase::Generating);
        Ok(Effect::FetchImage { request_id, url })
    }

    fn render_finished(&mut self, request_id: u64, result: Result<RenderedImage>) {
        if self.pending.as_ref().map(|p| p.request_id) != Some(request_id) {
            log::debug!("discarding stale render {}", request_id);
            return;
        }
        let Some(pending) = self.pending.take() else {
            return;
        };

        match result {
            Ok(image) => {
                self.history.record(&pending.name, &image.url);
                self.shown = Some(Shown::Rendered(image));
                self.notice = None;
                self.settle(Phase::Shown);
            }
            Err(e) => {
                log::warn!("render {} failed: {}", request_id, e);
                self.shown = None;
                self.notice = Some(self.labels().generate_failed);
                self.last_error = Some(e);
                self.settle(Phase::Failed);
            }
        }
    }

    // While browsing, outcomes update the phase restored on close.
    fn settle(&mut self, phase: Phase) {
        if self.phase == Phase::Browsing {
            self.resume = phase;
        } else {
            self.phase = phase;
        }
    }

    fn labels(&self) -> &'static crate::form::Labels {
        self.locale.labels()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_status(&self) -> CatalogStatus {
        self.catalog_status
    }

    pub fn search_term(&self) -> &str {
        &self.search
    }

    /// Catalog entries matching the current search term.
    pub fn visible(&self) -> Vec<&Template> {
        self.catalog.filter(&self.search)
    }

    pub fn selected(&self) -> Option<&Template> {
        self.selected.as_ref()
    }

    pub fn form(&self) -> &FormSpec {
        &self.form
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn shown(&self) -> Option<&Shown> {
        self.shown.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_generating(&self) -> bool {
        self.pending.is_some()
    }

    /// Status line for the user, if any.
    pub fn notice(&self) -> Option<&'static str> {
        self.notice
    }

    /// Localized message for an empty search result.
    pub fn no_results_notice(&self) -> &'static str {
        self.labels().no_results
    }

    /// Localized "generate first" message, used when downloading too early.
    pub fn generate_first_notice(&self) -> &'static str {
        self.labels().generate_first
    }

    /// Take the error of the last failed catalog load or render.
    pub fn take_error(&mut self) -> Option<Error> {
        self.last_error.take()
    }
}
