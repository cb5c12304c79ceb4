//! Runs controller effects against a `MemeApi`.
//!
//! Each effect executes on its own thread and reports back over a channel.
//! Completions are only ever applied on the thread that owns the session, so
//! the controller needs no locking.

use crate::api::{HttpApi, MemeApi};
use crate::controller::{Command, Controller, Effect, Event, Shown};
use crate::{ClientConfig, Error, Result};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

pub struct Session {
    controller: Controller,
    api: Arc<dyn MemeApi>,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    in_flight: usize,
}

impl Session {
    /// Session talking to the endpoints in `config` over HTTP.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let api = HttpApi::new(config.clone())?;
        Ok(Self::with_api(&config, Arc::new(api)))
    }

    /// Session over any `MemeApi` implementation.
    pub fn with_api(config: &ClientConfig, api: Arc<dyn MemeApi>) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            controller: Controller::new(config),
            api,
            events_tx,
            events_rx,
            in_flight: 0,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    /// Hand a command to the controller and start the effects it asks for.
    pub fn dispatch(&mut self, command: Command) -> Result<()> {
        let effects = self.controller.handle(command)?;
        for effect in effects {
            self.spawn(effect);
        }
        Ok(())
    }

    fn spawn(&mut self, effect: Effect) {
        let api = Arc::clone(&self.api);
        let tx = self.events_tx.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            let fallback = failure_event(&effect);
            // A panicking collaborator still has to report back, or
            // `wait_idle` would block forever.
            let event = match panic::catch_unwind(AssertUnwindSafe(|| run(api.as_ref(), effect))) {
                Ok(event) => event,
                Err(_) => {
                    log::warn!("effect worker panicked");
                    fallback
                }
            };
            // Receiver gone means the session was dropped
            let _ = tx.send(event);
        });
    }

    /// Apply every completion that has already arrived. Returns how many
    /// were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.complete(event);
            applied += 1;
        }
        applied
    }

    /// Block until every started effect has completed.
    pub fn wait_idle(&mut self) {
        while self.in_flight > 0 {
            match self.events_rx.recv() {
                Ok(event) => self.complete(event),
                // unreachable while we hold a sender
                Err(_) => break,
            }
        }
    }

    fn complete(&mut self, event: Event) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.controller.apply(event);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Save the shown image to `path`.
    ///
    /// A freshly rendered image is written as is; a recalled history entry is
    /// fetched again from its URL.
    pub fn download(&self, path: &Path) -> Result<()> {
        let bytes = match self.controller.shown() {
            Some(Shown::Rendered(image)) => image.bytes.clone(),
            Some(Shown::Recalled(entry)) => self.api.fetch_image(&entry.url)?.bytes,
            None => {
                log::warn!("{}", self.controller.generate_first_notice());
                return Err(Error::NothingToDownload);
            }
        };
        std::fs::write(path, bytes)?;
        log::info!("saved meme to {}", path.display());
        Ok(())
    }
}

fn run(api: &dyn MemeApi, effect: Effect) -> Event {
    match effect {
        Effect::FetchCatalog => Event::CatalogLoaded(api.fetch_catalog()),
        Effect::FetchImage { request_id, url } => Event::RenderFinished {
            request_id,
            result: api.fetch_image(&url),
        },
    }
}

/// Completion reported when running `effect` panicked.
fn failure_event(effect: &Effect) -> Event {
    match effect {
        Effect::FetchCatalog => {
            Event::CatalogLoaded(Err(Error::Network("catalog fetch panicked".into())))
        }
        Effect::FetchImage { request_id, url } => Event::RenderFinished {
            request_id: *request_id,
            result: Err(Error::Render(format!("render fetch for {} panicked", url))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::controller::Phase;
    use crate::render::RenderedImage;
    use serde_json::json;
    use std::sync::Mutex;

    /// In-memory API recording requested URLs
    struct FakeApi {
        catalog_calls: Mutex<usize>,
        requested: Mutex<Vec<String>>,
        fail_render: bool,
    }

    impl FakeApi {
        fn new(fail_render: bool) -> Self {
            Self {
                catalog_calls: Mutex::new(0),
                requested: Mutex::new(vec![]),
                fail_render,
            }
        }
    }

    impl MemeApi for FakeApi {
        fn fetch_catalog(&self) -> Result<Catalog> {
            *self.catalog_calls.lock().unwrap() += 1;
            Catalog::from_payload(&json!({
                "5": { "data": { "name": "Wave", "type": 5, "params": ["msg"] } }
            }))
        }

        fn fetch_image(&self, url: &str) -> Result<RenderedImage> {
            self.requested.lock().unwrap().push(url.to_string());
            if self.fail_render {
                return Err(Error::Render("not an image".into()));
            }
            Ok(RenderedImage {
                url: url.to_string(),
                bytes: b"fake".to_vec(),
                format: image::ImageFormat::Png,
                width: 1,
                height: 1,
            })
        }
    }

    /// Serves the catalog, then panics on every render.
    struct PanickingApi;

    impl MemeApi for PanickingApi {
        fn fetch_catalog(&self) -> Result<Catalog> {
            FakeApi::new(false).fetch_catalog()
        }

        fn fetch_image(&self, _url: &str) -> Result<RenderedImage> {
            panic!("renderer blew up");
        }
    }

    fn config() -> ClientConfig {
        ClientConfig {
            render_endpoint: "http://fake/render".into(),
            ..Default::default()
        }
    }

    #[test]
    fn drives_full_flow() {
        let api = Arc::new(FakeApi::new(false));
        let mut session = Session::with_api(&config(), api.clone());

        session.dispatch(Command::OpenCatalog).unwrap();
        session.wait_idle();
        session.dispatch(Command::OpenCatalog).unwrap();
        assert_eq!(session.in_flight(), 0);
        assert_eq!(*api.catalog_calls.lock().unwrap(), 1);

        session.dispatch(Command::Select("5".into())).unwrap();
        session
            .dispatch(Command::SetField { key: "msg".into(), value: "hello world".into() })
            .unwrap();
        session.dispatch(Command::Generate).unwrap();
        session.wait_idle();

        assert_eq!(session.controller().phase(), Phase::Shown);
        assert_eq!(
            api.requested.lock().unwrap().as_slice(),
            ["http://fake/render?type=5&msg=hello%20world".to_string()]
        );
        assert_eq!(session.controller().history().len(), 1);
    }

    #[test]
    fn failed_render_surfaces_failure() {
        let api = Arc::new(FakeApi::new(true));
        let mut session = Session::with_api(&config(), api);
        session.dispatch(Command::OpenCatalog).unwrap();
        session.wait_idle();
        session.dispatch(Command::Select("5".into())).unwrap();
        session.dispatch(Command::Generate).unwrap();
        session.wait_idle();

        assert_eq!(session.controller().phase(), Phase::Failed);
        assert!(session.controller().history().is_empty());
        assert!(session.controller_mut().take_error().unwrap().is_render());
    }

    #[test]
    fn download_requires_shown_image() {
        let session = Session::with_api(&config(), Arc::new(FakeApi::new(false)));
        let path = std::env::temp_dir().join("memekit-session-none.png");
        assert!(matches!(session.download(&path), Err(Error::NothingToDownload)));
    }

    #[test]
    fn download_writes_rendered_bytes() {
        let mut session = Session::with_api(&config(), Arc::new(FakeApi::new(false)));
        session.dispatch(Command::OpenCatalog).unwrap();
        session.wait_idle();
        session.dispatch(Command::Select("5".into())).unwrap();
        session.dispatch(Command::Generate).unwrap();
        session.wait_idle();

        let path = std::env::temp_dir().join(format!("memekit-session-{}.png", std::process::id()));
        session.download(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"fake");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn panicking_effect_still_completes() {
        let mut session = Session::with_api(&config(), Arc::new(PanickingApi));
        session.dispatch(Command::OpenCatalog).unwrap();
        session.wait_idle();
        session.dispatch(Command::Select("5".into())).unwrap();
        session.dispatch(Command::Generate).unwrap();
        session.wait_idle();

        assert_eq!(session.in_flight(), 0);
        assert_eq!(session.controller().phase(), Phase::Failed);
        assert!(session.controller().history().is_empty());
        assert!(session.controller_mut().take_error().unwrap().is_render());
    }
}
