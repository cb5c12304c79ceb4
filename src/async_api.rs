use crate::api::MemeApi;
use crate::catalog::Template;
use crate::controller::{CatalogStatus, Command, Shown};
use crate::form::FormSpec;
use crate::history::HistoryEntry;
use crate::render::RenderedImage;
use crate::session::Session;
use crate::{ClientConfig, Error, Result};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

enum Request {
    LoadCatalog(oneshot::Sender<Result<Vec<Template>>>),
    Search(String, oneshot::Sender<Vec<Template>>),
    Select(String, oneshot::Sender<Result<FormSpec>>),
    SetField(String, String, oneshot::Sender<Result<()>>),
    Generate(oneshot::Sender<Result<RenderedImage>>),
    History(oneshot::Sender<Vec<HistoryEntry>>),
    Recall(usize, oneshot::Sender<Result<String>>),
    Close(oneshot::Sender<()>),
}

/// An async-friendly meme client backed by a dedicated worker thread.
///
/// The worker owns the `Session` (and with it all application state) and
/// executes requests sent from async tasks one at a time.
#[derive(Clone)]
pub struct MemeClient {
    req_tx: Sender<Request>,
}

impl MemeClient {
    /// Create a client talking HTTP to the endpoints in `config`.
    pub async fn new(config: Option<ClientConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();
        Self::spawn(move || Session::new(config)).await
    }

    /// Create a client over a custom `MemeApi`.
    pub async fn with_api(config: ClientConfig, api: Arc<dyn MemeApi>) -> Result<Self> {
        Self::spawn(move || Ok(Session::with_api(&config, api))).await
    }

    async fn spawn<F>(make_session: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Session> + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<Request>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::spawn(move || {
            let mut session = match make_session() {
                Ok(s) => s,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            while let Ok(req) = req_rx.recv() {
                match req {
                    Request::LoadCatalog(resp) => {
                        let _ = resp.send(load_catalog(&mut session));
                    }
                    Request::Search(term, resp) => {
                        let _ = session.dispatch(Command::Search(term));
                        let found = session.controller().visible().into_iter().cloned().collect();
                        let _ = resp.send(found);
                    }
                    Request::Select(id, resp) => {
                        let res = session
                            .dispatch(Command::Select(id))
                            .map(|_| session.controller().form().clone());
                        let _ = resp.send(res);
                    }
                    Request::SetField(key, value, resp) => {
                        let _ = resp.send(session.dispatch(Command::SetField { key, value }));
                    }
                    Request::Generate(resp) => {
                        let _ = resp.send(generate(&mut session));
                    }
                    Request::History(resp) => {
                        let entries = session.controller().history().iter().cloned().collect();
                        let _ = resp.send(entries);
                    }
                    Request::Recall(index, resp) => {
                        let res = session.dispatch(Command::Recall(index)).map(|_| {
                            session
                                .controller()
                                .shown()
                                .map(|s| s.url().to_string())
                                .unwrap_or_default()
                        });
                        let _ = resp.send(res);
                    }
                    Request::Close(resp) => {
                        session.wait_idle();
                        let _ = resp.send(());
                        break;
                    }
                }
            }
        });

        init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))??;

        Ok(Self { req_tx })
    }

    /// Load the catalog (first call only hits the network) and return it.
    pub async fn load_catalog(&self) -> Result<Vec<Template>> {
        let (tx, rx) = oneshot::channel();
        let _ = self.req_tx.send(Request::LoadCatalog(tx));
        rx.await
            .map_err(|e| Error::Other(format!("LoadCatalog canceled: {}", e)))?
    }

    /// Templates matching `term` in catalog order
    pub async fn search(&self, term: &str) -> Result<Vec<Template>> {
        let (tx, rx) = oneshot::channel();
        let _ = self.req_tx.send(Request::Search(term.to_string(), tx));
        rx.await
            .map_err(|e| Error::Other(format!("Search canceled: {}", e)))
    }

    /// Select a template and return its form
    pub async fn select(&self, id: &str) -> Result<FormSpec> {
        let (tx, rx) = oneshot::channel();
        let _ = self.req_tx.send(Request::Select(id.to_string(), tx));
        rx.await
            .map_err(|e| Error::Other(format!("Select canceled: {}", e)))?
    }

    pub async fn set_field(&self, key: &str, value: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self
            .req_tx
            .send(Request::SetField(key.to_string(), value.to_string(), tx));
        rx.await
            .map_err(|e| Error::Other(format!("SetField canceled: {}", e)))?
    }

    /// Render the selected template with the current values.
    pub async fn generate(&self) -> Result<RenderedImage> {
        let (tx, rx) = oneshot::channel();
        let _ = self.req_tx.send(Request::Generate(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Generate canceled: {}", e)))?
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
        let (tx, rx) = oneshot::channel();
        let _ = self.req_tx.send(Request::History(tx));
        rx.await
            .map_err(|e| Error::Other(format!("History canceled: {}", e)))
    }

    /// Re-display a history entry; returns its URL.
    pub async fn recall(&self, index: usize) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        let _ = self.req_tx.send(Request::Recall(index, tx));
        rx.await
            .map_err(|e| Error::Other(format!("Recall canceled: {}", e)))?
    }

    /// Shut the worker down after outstanding requests finish.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.req_tx.send(Request::Close(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))
    }
}

fn load_catalog(session: &mut Session) -> Result<Vec<Template>> {
    session.dispatch(Command::OpenCatalog)?;
    session.wait_idle();
    session.dispatch(Command::CloseCatalog)?;
    if session.controller().catalog_status() == CatalogStatus::Failed {
        return Err(session
            .controller_mut()
            .take_error()
            .unwrap_or_else(|| Error::Network("catalog load failed".into())));
    }
    Ok(session.controller().catalog().templates().to_vec())
}

fn generate(session: &mut Session) -> Result<RenderedImage> {
    session.dispatch(Command::Generate)?;
    session.wait_idle();
    if let Some(Shown::Rendered(image)) = session.controller().shown() {
        return Ok(image.clone());
    }
    Err(session
        .controller_mut()
        .take_error()
        .unwrap_or_else(|| Error::Render("render produced no image".into())))
}
