use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::assets::resolver::AssetResolver;
use crate::assets::source::AssetSource;
use crate::foundation::core::{HexColor, View};
use crate::foundation::error::{DyelotError, DyelotResult};
use crate::render::compositor::{CompositorOpts, composite};
use crate::render::encode::EncodedImage;
use crate::scene::request::RenderRequest;

/// Which stage a render cycle failed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// A layer could not be fetched or decoded.
    AssetLoad,
    /// Compositing or encoding failed.
    Render,
}

/// Why the latest render cycle produced no image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderFailure {
    /// Failing stage.
    pub kind: FailureKind,
    /// Human-readable reason.
    pub message: String,
}

impl RenderFailure {
    fn from_error(err: &DyelotError) -> Self {
        let kind = match err {
            DyelotError::AssetLoad(_) => FailureKind::AssetLoad,
            _ => FailureKind::Render,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Observable controller status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderState {
    /// A cycle for the current parameters is in flight.
    Loading,
    /// The current parameters rendered successfully.
    Ready(EncodedImage),
    /// The current parameters failed to render.
    Failed(RenderFailure),
}

impl RenderState {
    /// `true` once the cycle has finished either way.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Loading)
    }
}

/// What to do with a cycle that finishes after newer parameters were set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StalePolicy {
    /// Drop results from superseded cycles.
    #[default]
    Discard,
    /// Let whichever cycle finishes last win, even if it rendered old parameters.
    LastWriterWins,
}

/// Controller configuration.
#[derive(Clone, Debug, Default)]
pub struct ControllerOpts {
    /// Compositor settings used by every cycle.
    pub compositor: CompositorOpts,
    /// Handling of superseded cycles.
    pub stale_policy: StalePolicy,
}

#[derive(Debug)]
struct Inner {
    generation: u64,
    state: RenderState,
    displayed: Option<EncodedImage>,
}

struct Shared {
    inner: Mutex<Inner>,
    settled: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Plain values only; a poisoned lock is still consistent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Reactive driver that keeps a rendered preview in sync with its parameters.
///
/// Every parameter change starts a new resolve + composite cycle on a worker thread. The last
/// successful image stays available through [`RenderController::displayed_image`] while a newer
/// cycle is loading or after it failed.
pub struct RenderController<S> {
    resolver: Arc<AssetResolver<S>>,
    opts: ControllerOpts,
    request: RenderRequest,
    shared: Arc<Shared>,
}

impl<S: AssetSource + 'static> RenderController<S> {
    /// Validate `request` and start the first cycle.
    pub fn new(
        resolver: AssetResolver<S>,
        request: RenderRequest,
        opts: ControllerOpts,
    ) -> DyelotResult<Self> {
        request.validate()?;
        opts.compositor.validate()?;
        let ctl = Self {
            resolver: Arc::new(resolver),
            opts,
            request,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    generation: 0,
                    state: RenderState::Loading,
                    displayed: None,
                }),
                settled: Condvar::new(),
            }),
        };
        ctl.start_cycle();
        Ok(ctl)
    }

    /// Current parameters.
    pub fn request(&self) -> &RenderRequest {
        &self.request
    }

    /// Replace all parameters at once. Identical parameters do not start a cycle.
    pub fn set_request(&mut self, request: RenderRequest) -> DyelotResult<()> {
        request.validate()?;
        if request == self.request {
            return Ok(());
        }
        self.request = request;
        self.start_cycle();
        Ok(())
    }

    /// Change the garment color.
    pub fn set_color(&mut self, color: HexColor) -> DyelotResult<()> {
        let next = RenderRequest {
            color,
            ..self.request.clone()
        };
        self.set_request(next)
    }

    /// Change or clear the design graphic.
    pub fn set_design(&mut self, design_ref: Option<String>) -> DyelotResult<()> {
        let next = RenderRequest {
            design_ref,
            ..self.request.clone()
        };
        self.set_request(next)
    }

    /// Change the logical output width.
    pub fn set_output_width(&mut self, output_width: u32) -> DyelotResult<()> {
        let next = RenderRequest {
            output_width,
            ..self.request.clone()
        };
        self.set_request(next)
    }

    /// Switch between front and back.
    pub fn set_view(&mut self, view: View) -> DyelotResult<()> {
        let next = RenderRequest {
            view,
            ..self.request.clone()
        };
        self.set_request(next)
    }

    /// Status of the most recent cycle.
    pub fn state(&self) -> RenderState {
        self.shared.lock().state.clone()
    }

    /// Last successfully rendered image, kept through later loading and failure.
    pub fn displayed_image(&self) -> Option<EncodedImage> {
        self.shared.lock().displayed.clone()
    }

    /// Failure text when the current state is [`RenderState::Failed`].
    pub fn failure_message(&self) -> Option<String> {
        match &self.shared.lock().state {
            RenderState::Failed(f) => Some(f.message.clone()),
            _ => None,
        }
    }

    /// Number of cycles started so far.
    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    /// Block until the state leaves [`RenderState::Loading`] or `timeout` elapses.
    ///
    /// Returns the state observed last, which is still `Loading` on timeout.
    pub fn wait_settled(&self, timeout: Duration) -> RenderState {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.lock();
        while !inner.state.is_settled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            inner = match self.shared.settled.wait_timeout(inner, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        inner.state.clone()
    }

    fn start_cycle(&self) {
        let generation = {
            let mut inner = self.shared.lock();
            inner.generation += 1;
            inner.state = RenderState::Loading;
            inner.generation
        };
        tracing::debug!(
            generation,
            color = %self.request.color,
            view = %self.request.view,
            "render cycle started"
        );

        let resolver = Arc::clone(&self.resolver);
        let shared = Arc::clone(&self.shared);
        let request = self.request.clone();
        let compositor = self.opts.compositor.clone();
        let policy = self.opts.stale_policy;

        std::thread::spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let bundle = resolver.resolve(&request)?;
                composite(&bundle, request.color, request.output_width, &compositor)
            }))
            .unwrap_or_else(|_| Err(DyelotError::render("render cycle panicked")));
            publish(&shared, generation, policy, outcome);
        });
    }
}

fn publish(
    shared: &Shared,
    generation: u64,
    policy: StalePolicy,
    outcome: DyelotResult<EncodedImage>,
) {
    let mut inner = shared.lock();
    if generation != inner.generation && policy == StalePolicy::Discard {
        tracing::debug!(
            generation,
            current = inner.generation,
            "discarding stale render result"
        );
        return;
    }

    match outcome {
        Ok(img) => {
            tracing::debug!(generation, "render cycle ready");
            inner.displayed = Some(img.clone());
            inner.state = RenderState::Ready(img);
        }
        Err(e) => {
            tracing::warn!(generation, error = %e, "render cycle failed");
            inner.state = RenderState::Failed(RenderFailure::from_error(&e));
        }
    }
    drop(inner);
    shared.settled.notify_all();
}

#[cfg(test)]
#[path = "../../tests/unit/session/controller.rs"]
mod tests;
