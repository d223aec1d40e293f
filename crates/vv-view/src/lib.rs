#![forbid(unsafe_code)]

//! View state for an analysis result's visuals.
//!
//! [`ViewController`] is the synchronous state machine; [`Visualizer`] drives
//! it against a [`DiagramRenderer`] and a [`VisualsSource`] on a single
//! cooperative task. The controller is never borrowed across an await, so
//! overlapping renders and regenerations can be polled together and the
//! controller alone decides which results land.

mod boundary;
mod controller;

use std::cell::{Ref, RefCell};

use tracing::debug;
use vv_core::{ViewMode, Visuals};
use vv_render::{DiagramRenderer, RenderEngine};

pub use boundary::{Clipboard, ClipboardError, VisualsSource, parse_visuals};
pub use controller::{
    ExpandedView, GraphState, Panel, RenderDisposition, ViewController, ViewError, ViewState,
};

pub struct Visualizer<E, S> {
    controller: RefCell<ViewController>,
    renderer: DiagramRenderer<E>,
    source: S,
    code_context: RefCell<String>,
}

impl<E: RenderEngine, S: VisualsSource> Visualizer<E, S> {
    pub fn new(renderer: DiagramRenderer<E>, source: S) -> Self {
        Self {
            controller: RefCell::new(ViewController::new()),
            renderer,
            source,
            code_context: RefCell::default(),
        }
    }

    #[must_use]
    pub fn controller(&self) -> Ref<'_, ViewController> {
        self.controller.borrow()
    }

    /// Apply a synchronous user action, such as toggling inspection.
    pub fn update<T>(&self, action: impl FnOnce(&mut ViewController) -> T) -> T {
        action(&mut *self.controller.borrow_mut())
    }

    #[must_use]
    pub fn renderer(&self) -> &DiagramRenderer<E> {
        &self.renderer
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Show a new analysis result and render it.
    ///
    /// `code_context` is the analyzed code; later regenerations send it to the
    /// visuals source.
    pub async fn load_analysis(
        &self,
        code_context: impl Into<String>,
        visuals: &Visuals,
    ) -> Option<RenderDisposition> {
        *self.code_context.borrow_mut() = code_context.into();
        self.update(|controller| controller.load_analysis(visuals));
        self.refresh().await
    }

    /// Code sent to the visuals source on regeneration.
    #[must_use]
    pub fn code_context(&self) -> Ref<'_, str> {
        Ref::map(self.code_context.borrow(), String::as_str)
    }

    /// Run the render the controller asks for, if any.
    ///
    /// Returns `None` when nothing needed rendering.
    pub async fn refresh(&self) -> Option<RenderDisposition> {
        let ticket = {
            let mut controller = self.controller.borrow_mut();
            let ticket = self.renderer.begin(controller.render_request()?);
            controller.render_started(ticket.id);
            ticket
        };

        let outcome = self.renderer.complete(ticket).await;
        let disposition = self.controller.borrow_mut().render_finished(outcome);
        Some(disposition)
    }

    pub async fn select_mode(&self, mode: ViewMode) -> Option<RenderDisposition> {
        self.update(|controller| controller.select_mode(mode));
        self.refresh().await
    }

    /// Render the current source again after a failure.
    pub async fn retry(&self) -> Option<RenderDisposition> {
        self.update(ViewController::retry_render);
        self.refresh().await
    }

    /// Ask the source for new visuals and render them.
    ///
    /// Fails only when a regeneration is already pending; a failed
    /// regeneration is recorded on the controller instead.
    pub async fn regenerate(&self) -> Result<Option<RenderDisposition>, ViewError> {
        self.update(ViewController::begin_regeneration)?;
        let code_context = self.code_context.borrow().clone();
        debug!(bytes = code_context.len(), "regenerating visuals");

        let result = self.source.regenerate_visuals(&code_context).await;
        let replaced = result.is_ok();
        self.update(|controller| controller.finish_regeneration(result));

        if replaced {
            Ok(self.refresh().await)
        } else {
            Ok(None)
        }
    }
}
