use std::collections::HashMap;
use std::io::Cursor;

use super::*;
use crate::assets::manifest::AssetManifest;
use crate::assets::source::MemoryAssetSource;

const WAIT: Duration = Duration::from_secs(10);

fn png(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_raw(w, h, px.repeat((w * h) as usize)).unwrap();
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn manifest() -> AssetManifest {
    AssetManifest {
        background: "bg.png".to_string(),
        shadow: Some("shadow.png".to_string()),
        front: "front.png".to_string(),
        back: "back.png".to_string(),
    }
}

fn memory() -> MemoryAssetSource {
    MemoryAssetSource::new()
        .with("bg.png", png(8, 4, [240, 240, 240, 255]))
        .with("shadow.png", png(8, 4, [0, 0, 0, 40]))
        .with("front.png", png(8, 4, [180, 180, 180, 255]))
        .with("back.png", png(8, 4, [150, 150, 150, 255]))
        .with("slow.png", png(2, 2, [255, 0, 0, 255]))
        .with("fast.png", png(2, 2, [0, 0, 255, 255]))
}

/// Blocks fetches of selected URIs until the test opens them.
struct GatedSource {
    inner: MemoryAssetSource,
    gates: HashMap<String, Arc<(Mutex<bool>, Condvar)>>,
    released: Arc<Mutex<Vec<String>>>,
}

impl GatedSource {
    fn new(inner: MemoryAssetSource, gated: &[&str]) -> Self {
        Self {
            inner,
            gates: gated
                .iter()
                .map(|u| (u.to_string(), Arc::new((Mutex::new(false), Condvar::new()))))
                .collect(),
            released: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn handle(&self) -> GateHandle {
        GateHandle {
            gates: self.gates.clone(),
            released: Arc::clone(&self.released),
        }
    }
}

#[derive(Clone)]
struct GateHandle {
    gates: HashMap<String, Arc<(Mutex<bool>, Condvar)>>,
    released: Arc<Mutex<Vec<String>>>,
}

impl GateHandle {
    fn open(&self, uri: &str) {
        let (lock, cv) = &*self.gates[uri];
        *lock.lock().unwrap() = true;
        cv.notify_all();
    }

    fn wait_released(&self, uri: &str) {
        let deadline = Instant::now() + WAIT;
        while !self.released.lock().unwrap().iter().any(|u| u == uri) {
            assert!(Instant::now() < deadline, "{uri} never released");
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

impl AssetSource for GatedSource {
    fn fetch(&self, uri: &str) -> DyelotResult<Vec<u8>> {
        if let Some(gate) = self.gates.get(uri) {
            let (lock, cv) = &**gate;
            let mut open = lock.lock().unwrap();
            while !*open {
                open = cv.wait(open).unwrap();
            }
        }
        let out = self.inner.fetch(uri);
        self.released.lock().unwrap().push(uri.to_string());
        out
    }
}

fn expected(req: &RenderRequest) -> EncodedImage {
    let resolver = AssetResolver::new(manifest(), memory()).unwrap();
    let bundle = resolver.resolve(req).unwrap();
    composite(
        &bundle,
        req.color,
        req.output_width,
        &CompositorOpts::default(),
    )
    .unwrap()
}

fn wait_for<F: Fn() -> bool>(cond: F) {
    let deadline = Instant::now() + WAIT;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn base_request() -> RenderRequest {
    RenderRequest::new(HexColor::rgb(255, 0, 0)).with_output_width(40)
}

#[test]
fn first_cycle_reaches_ready() {
    let ctl = RenderController::new(
        AssetResolver::new(manifest(), memory()).unwrap(),
        base_request(),
        ControllerOpts::default(),
    )
    .unwrap();

    let state = ctl.wait_settled(WAIT);
    let RenderState::Ready(img) = state else {
        panic!("expected ready, got {state:?}");
    };
    assert_eq!(img, expected(&base_request()));
    assert_eq!(img.logical_size().width, 40);
    assert_eq!(img.logical_size().height, 20);
    assert_eq!(ctl.displayed_image(), Some(img));
    assert_eq!(ctl.failure_message(), None);
    assert_eq!(ctl.generation(), 1);
}

#[test]
fn identical_parameters_do_not_start_a_cycle() {
    let mut ctl = RenderController::new(
        AssetResolver::new(manifest(), memory()).unwrap(),
        base_request(),
        ControllerOpts::default(),
    )
    .unwrap();
    ctl.wait_settled(WAIT);

    ctl.set_color(HexColor::rgb(255, 0, 0)).unwrap();
    ctl.set_view(View::Front).unwrap();
    assert_eq!(ctl.generation(), 1);

    ctl.set_view(View::Back).unwrap();
    assert_eq!(ctl.generation(), 2);
    assert_eq!(ctl.request().view, View::Back);
}

#[test]
fn invalid_parameters_are_rejected_without_a_cycle() {
    let mut ctl = RenderController::new(
        AssetResolver::new(manifest(), memory()).unwrap(),
        base_request(),
        ControllerOpts::default(),
    )
    .unwrap();
    assert!(ctl.set_output_width(0).is_err());
    assert!(ctl.set_design(Some(String::new())).is_err());
    assert_eq!(ctl.generation(), 1);
    assert_eq!(ctl.request().output_width, 40);

    assert!(
        RenderController::new(
            AssetResolver::new(manifest(), memory()).unwrap(),
            base_request().with_output_width(0),
            ControllerOpts::default(),
        )
        .is_err()
    );
}

#[test]
fn first_cycle_failure_shows_explicit_failure() {
    let src = MemoryAssetSource::new()
        .with("front.png", png(8, 4, [1, 1, 1, 255]))
        .with("shadow.png", png(8, 4, [0, 0, 0, 40]));
    let ctl = RenderController::new(
        AssetResolver::new(manifest(), src).unwrap(),
        base_request(),
        ControllerOpts::default(),
    )
    .unwrap();

    let state = ctl.wait_settled(WAIT);
    let RenderState::Failed(failure) = state else {
        panic!("expected failure, got {state:?}");
    };
    assert_eq!(failure.kind, FailureKind::AssetLoad);
    assert!(ctl.displayed_image().is_none());
    assert!(ctl.failure_message().unwrap().contains("bg.png"));
}

#[test]
fn later_failure_keeps_previous_image_displayed() {
    let mut ctl = RenderController::new(
        AssetResolver::new(manifest(), memory()).unwrap(),
        base_request(),
        ControllerOpts::default(),
    )
    .unwrap();
    let RenderState::Ready(first) = ctl.wait_settled(WAIT) else {
        panic!("first cycle should succeed");
    };

    ctl.set_design(Some("missing.png".to_string())).unwrap();
    let state = ctl.wait_settled(WAIT);
    assert!(matches!(
        state,
        RenderState::Failed(RenderFailure {
            kind: FailureKind::AssetLoad,
            ..
        })
    ));
    assert_eq!(ctl.displayed_image(), Some(first));
}

#[test]
fn rapid_changes_settle_on_latest_parameters() {
    let mut ctl = RenderController::new(
        AssetResolver::new(manifest(), memory()).unwrap(),
        base_request(),
        ControllerOpts::default(),
    )
    .unwrap();
    ctl.set_color(HexColor::rgb(0, 128, 0)).unwrap();
    ctl.set_color(HexColor::rgb(0, 0, 200)).unwrap();

    let state = ctl.wait_settled(WAIT);
    let latest = RenderRequest {
        color: HexColor::rgb(0, 0, 200),
        ..base_request()
    };
    assert_eq!(state, RenderState::Ready(expected(&latest)));
    assert_eq!(ctl.generation(), 3);
}

#[test]
fn loading_is_observable_while_layers_are_in_flight() {
    let gated = GatedSource::new(memory(), &["slow.png"]);
    let gate = gated.handle();
    let ctl = RenderController::new(
        AssetResolver::new(manifest(), gated).unwrap(),
        base_request().with_design("slow.png"),
        ControllerOpts::default(),
    )
    .unwrap();

    assert_eq!(ctl.state(), RenderState::Loading);
    assert_eq!(
        ctl.wait_settled(Duration::from_millis(20)),
        RenderState::Loading
    );
    assert!(ctl.displayed_image().is_none());

    gate.open("slow.png");
    assert!(matches!(ctl.wait_settled(WAIT), RenderState::Ready(_)));
}

#[test]
fn stale_cycle_is_discarded_by_default() {
    let gated = GatedSource::new(memory(), &["slow.png"]);
    let gate = gated.handle();
    let mut ctl = RenderController::new(
        AssetResolver::new(manifest(), gated).unwrap(),
        base_request().with_design("slow.png"),
        ControllerOpts::default(),
    )
    .unwrap();

    ctl.set_design(Some("fast.png".to_string())).unwrap();
    let fast = expected(&base_request().with_design("fast.png"));
    assert_eq!(ctl.wait_settled(WAIT), RenderState::Ready(fast.clone()));

    gate.open("slow.png");
    gate.wait_released("slow.png");
    std::thread::sleep(Duration::from_millis(200));

    assert_eq!(ctl.state(), RenderState::Ready(fast.clone()));
    assert_eq!(ctl.displayed_image(), Some(fast));
}

#[test]
fn last_writer_wins_policy_pins_the_race() {
    let gated = GatedSource::new(memory(), &["slow.png"]);
    let gate = gated.handle();
    let mut ctl = RenderController::new(
        AssetResolver::new(manifest(), gated).unwrap(),
        base_request().with_design("slow.png"),
        ControllerOpts {
            stale_policy: StalePolicy::LastWriterWins,
            ..ControllerOpts::default()
        },
    )
    .unwrap();

    ctl.set_design(Some("fast.png".to_string())).unwrap();
    let fast = expected(&base_request().with_design("fast.png"));
    assert_eq!(ctl.wait_settled(WAIT), RenderState::Ready(fast));

    gate.open("slow.png");
    let slow = expected(&base_request().with_design("slow.png"));
    wait_for(|| ctl.displayed_image().as_ref() == Some(&slow));
    assert_eq!(ctl.state(), RenderState::Ready(slow));
    assert_eq!(ctl.request().design_ref.as_deref(), Some("fast.png"));
}
