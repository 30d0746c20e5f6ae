use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use trackkit_feed::{E7Coordinate, FeedSource, KEY_LEN, NONCE_LEN, PacketCodec};
use trackkit_location::{
    Accuracy, Coordinate, GeolocationProvider, Location, LocationError, LocationResult,
    LocationStream, PositionRequest, WatchOptions,
};
use trackkit_permission::{Permission, PermissionError, PermissionProvider, PermissionStatus, Rationale};
use trackkit_poller::{CoordinateSource, PollError, PollResult};
use trackkit_screen::{
    Collaborators, FIXED_TARGET, LOWER_ACCURACY_ADVISORY, MapScreen, ScreenConfig, ScreenError,
    TargetSource,
};

struct FakePermissions {
    runtime: bool,
    answer: Result<PermissionStatus, PermissionError>,
}

impl PermissionProvider for FakePermissions {
    fn requires_runtime_grant(&self) -> bool {
        self.runtime
    }

    fn request(
        &self,
        _permission: Permission,
        _rationale: &Rationale,
    ) -> BoxFuture<'static, Result<PermissionStatus, PermissionError>> {
        let answer = self.answer.clone();
        Box::pin(async move { answer })
    }
}

fn permissions(answer: Result<PermissionStatus, PermissionError>) -> Arc<FakePermissions> {
    Arc::new(FakePermissions {
        runtime: true,
        answer,
    })
}

fn fix(latitude: f64) -> Location {
    Location {
        latitude,
        longitude: 24.0,
        altitude: None,
        horizontal_accuracy: None,
        vertical_accuracy: None,
        timestamp: 0,
    }
}

struct FakeGeolocation {
    cached: LocationResult<Location>,
    precise: LocationResult<Location>,
    watch_tx: async_channel::Sender<LocationResult<Location>>,
    watch_rx: async_channel::Receiver<LocationResult<Location>>,
    requests: AtomicUsize,
}

impl FakeGeolocation {
    fn new(cached: LocationResult<Location>, precise: LocationResult<Location>) -> Arc<Self> {
        let (watch_tx, watch_rx) = async_channel::unbounded();
        Arc::new(Self {
            cached,
            precise,
            watch_tx,
            watch_rx,
            requests: AtomicUsize::new(0),
        })
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl GeolocationProvider for FakeGeolocation {
    fn current_position(&self, request: PositionRequest) -> BoxFuture<'static, LocationResult<Location>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let result = match request.accuracy {
            Accuracy::Balanced => self.cached.clone(),
            Accuracy::High => self.precise.clone(),
        };
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            result
        })
    }

    fn watch_position(&self, _options: WatchOptions) -> LocationResult<LocationStream> {
        Ok(Box::pin(self.watch_rx.clone()))
    }
}

struct FakeCoordinates(Mutex<VecDeque<PollResult>>);

impl FakeCoordinates {
    fn new(results: Vec<PollResult>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(results.into())))
    }
}

impl CoordinateSource for FakeCoordinates {
    fn fetch(&self) -> BoxFuture<'static, PollResult> {
        let result = self.0.lock().unwrap().pop_front().unwrap_or(PollResult::Incomplete);
        Box::pin(async move { result })
    }
}

fn remote_config() -> ScreenConfig {
    ScreenConfig {
        source: TargetSource::remote("http://127.0.0.1:8080/coordinates"),
        ..ScreenConfig::default()
    }
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn denied_permission_never_tracks() {
    let geolocation = FakeGeolocation::new(Ok(fix(49.0)), Ok(fix(49.1)));
    let collaborators = Collaborators {
        permissions: permissions(Ok(PermissionStatus::Denied)),
        geolocation: geolocation.clone(),
        coordinates: None,
    };

    let mut screen = MapScreen::mount(ScreenConfig::default(), collaborators).await.unwrap();
    advance(5_000).await;

    let state = screen.state();
    assert!(!state.has_location_permission);
    assert_eq!(state.notice.map(|n| n.title), Some("Permission Denied".to_owned()));
    assert_eq!(geolocation.requests(), 0);
    assert!(screen.view().user.is_none());
    assert!(!screen.retry_location());
    assert_eq!(geolocation.requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn permission_error_is_shown_as_location_error() {
    let geolocation = FakeGeolocation::new(Ok(fix(49.0)), Ok(fix(49.1)));
    let collaborators = Collaborators {
        permissions: permissions(Err(PermissionError::Unknown("no activity".into()))),
        geolocation: geolocation.clone(),
        coordinates: None,
    };

    let screen = MapScreen::mount(ScreenConfig::default(), collaborators).await.unwrap();
    advance(10).await;

    assert_eq!(
        screen.state().location_error.as_deref(),
        Some("unknown error: no activity")
    );
    let error = screen.view().error.unwrap();
    assert_eq!(error.text, "Error: unknown error: no activity");
    assert!(!error.retry);
    assert_eq!(geolocation.requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn precise_fix_replaces_cached_fix() {
    let geolocation = FakeGeolocation::new(Ok(fix(49.0)), Ok(fix(49.1)));
    let collaborators = Collaborators {
        permissions: Arc::new(FakePermissions {
            runtime: false,
            answer: Err(PermissionError::NotSupported),
        }),
        geolocation: geolocation.clone(),
        coordinates: None,
    };

    let screen = MapScreen::mount(ScreenConfig::default(), collaborators).await.unwrap();
    advance(500).await;
    assert_eq!(screen.state().user_location, Some(Coordinate::new(49.0, 24.0)));

    advance(1_000).await;
    let state = screen.state();
    assert!(state.has_location_permission);
    assert_eq!(state.user_location, Some(Coordinate::new(49.1, 24.0)));
    assert_eq!(state.location_error, None);

    let view = screen.view();
    assert_eq!(view.user.map(|m| m.coordinate), Some(Coordinate::new(49.1, 24.0)));
}

#[tokio::test(start_paused = true)]
async fn advisory_then_retry() {
    let geolocation = FakeGeolocation::new(Err(LocationError::Timeout), Err(LocationError::Timeout));
    let collaborators = Collaborators {
        permissions: permissions(Ok(PermissionStatus::Granted)),
        geolocation: geolocation.clone(),
        coordinates: None,
    };

    let mut screen = MapScreen::mount(ScreenConfig::default(), collaborators).await.unwrap();
    advance(2_000).await;

    assert_eq!(screen.state().location_error.as_deref(), Some(LOWER_ACCURACY_ADVISORY));
    let view = screen.view();
    assert_eq!(view.error.map(|e| e.retry), Some(true));
    assert_eq!(geolocation.requests(), 2);

    assert!(screen.retry_location());
    advance(10).await;
    assert_eq!(screen.state().location_error, None);
    assert_eq!(geolocation.requests(), 3);

    // The retried precise request fails again with still no fix.
    advance(2_000).await;
    assert_eq!(screen.state().location_error.as_deref(), Some(LOWER_ACCURACY_ADVISORY));
    assert_eq!(geolocation.requests(), 4);
}

#[tokio::test(start_paused = true)]
async fn watch_fix_suppresses_later_advisory() {
    let geolocation = FakeGeolocation::new(Err(LocationError::Timeout), Err(LocationError::Timeout));
    let collaborators = Collaborators {
        permissions: permissions(Ok(PermissionStatus::Granted)),
        geolocation: geolocation.clone(),
        coordinates: None,
    };

    let screen = MapScreen::mount(ScreenConfig::default(), collaborators).await.unwrap();
    geolocation.watch_tx.send(Ok(fix(50.0))).await.unwrap();
    advance(2_000).await;

    let state = screen.state();
    assert_eq!(state.user_location, Some(Coordinate::new(50.0, 24.0)));
    assert_eq!(state.location_error, None);
}

#[tokio::test(start_paused = true)]
async fn remote_target_follows_polls() {
    let geolocation = FakeGeolocation::new(Err(LocationError::Timeout), Err(LocationError::Timeout));
    let coordinates = FakeCoordinates::new(vec![
        PollResult::Updated {
            coordinate: Coordinate::new(49.83, 24.01),
            timestamp: "10:00:00".into(),
        },
        PollResult::Failed(PollError::Timeout(Duration::from_millis(3_000))),
        PollResult::Incomplete,
    ]);
    let collaborators = Collaborators {
        permissions: permissions(Ok(PermissionStatus::Denied)),
        geolocation,
        coordinates: Some(coordinates),
    };

    let screen = MapScreen::mount(remote_config(), collaborators).await.unwrap();
    advance(100).await;

    let state = screen.state();
    assert_eq!(state.target, Coordinate::new(49.83, 24.01));
    assert!(state.server_status.is_connected());
    assert!(state.server_status.to_string().contains("10:00:00"));
    assert_eq!(state.last_data_received.as_deref(), Some("10:00:00"));
    assert_eq!(screen.view().camera.center, Coordinate::new(49.83, 24.01));

    advance(5_000).await;
    let state = screen.state();
    assert_eq!(state.target, Coordinate::new(49.83, 24.01));
    assert!(!state.server_status.is_connected());
    assert!(state.server_status.to_string().contains("request timed out after 3000 ms"));

    screen.refresh_coordinates().await;
    advance(10).await;
    let state = screen.state();
    assert_eq!(state.incomplete_payloads, 1);
    assert_eq!(state.target, Coordinate::new(49.83, 24.01));
    assert!(!state.server_status.is_connected());
}

#[tokio::test(start_paused = true)]
async fn static_refresh_restores_fixed_target() {
    let collaborators = Collaborators {
        permissions: permissions(Ok(PermissionStatus::Denied)),
        geolocation: FakeGeolocation::new(Err(LocationError::Timeout), Err(LocationError::Timeout)),
        coordinates: None,
    };

    let screen = MapScreen::mount(ScreenConfig::default(), collaborators).await.unwrap();
    screen.dismiss_notice();
    screen.refresh_coordinates().await;
    advance(10).await;

    let state = screen.state();
    assert_eq!(state.target, FIXED_TARGET);
    assert_eq!(state.notice.map(|n| n.title), Some("Coordinates Loaded".to_owned()));
    assert!(screen.view().server_status.is_none());
}

#[tokio::test(start_paused = true)]
async fn unmount_freezes_state() {
    let geolocation = FakeGeolocation::new(Err(LocationError::Timeout), Err(LocationError::Timeout));
    let collaborators = Collaborators {
        permissions: permissions(Ok(PermissionStatus::Granted)),
        geolocation: geolocation.clone(),
        coordinates: None,
    };

    let screen = MapScreen::mount(ScreenConfig::default(), collaborators).await.unwrap();
    geolocation.watch_tx.send(Ok(fix(50.0))).await.unwrap();
    advance(10).await;
    let updates = screen.subscribe();

    screen.unmount();
    let _ = geolocation.watch_tx.send(Ok(fix(51.0))).await;
    advance(5_000).await;

    assert_eq!(updates.borrow().user_location, Some(Coordinate::new(50.0, 24.0)));
}

#[tokio::test(start_paused = true)]
async fn zero_poll_interval_is_refused() {
    let coordinates = FakeCoordinates::new(Vec::new());
    let collaborators = Collaborators {
        permissions: permissions(Ok(PermissionStatus::Denied)),
        geolocation: FakeGeolocation::new(Err(LocationError::Timeout), Err(LocationError::Timeout)),
        coordinates: Some(coordinates),
    };
    let config = ScreenConfig {
        source: TargetSource::RemotePoll {
            endpoint: "http://127.0.0.1:8080/coordinates".into(),
            interval_ms: 0,
            timeout_ms: 3_000,
        },
        ..ScreenConfig::default()
    };

    let err = MapScreen::mount(config, collaborators).await.unwrap_err();
    assert!(matches!(err, ScreenError::ZeroInterval));
}

#[tokio::test(start_paused = true)]
async fn local_feed_moves_the_target() {
    let key = [0x21; KEY_LEN];
    let (radio, packets) = async_channel::unbounded();
    let collaborators = Collaborators {
        permissions: permissions(Ok(PermissionStatus::Denied)),
        geolocation: FakeGeolocation::new(Err(LocationError::Timeout), Err(LocationError::Timeout)),
        coordinates: Some(Arc::new(FeedSource::packets(packets, PacketCodec::new(key)))),
    };
    let config = ScreenConfig {
        source: TargetSource::LocalFeed { interval_ms: 1_000 },
        ..ScreenConfig::default()
    };

    let screen = MapScreen::mount(config, collaborators).await.unwrap();
    advance(100).await;
    assert_eq!(screen.state().target, FIXED_TARGET);
    assert_eq!(screen.state().incomplete_payloads, 1);

    let sealed = PacketCodec::new(key)
        .seal([1; NONCE_LEN], E7Coordinate::new(498_180_162, 240_225_620))
        .unwrap();
    radio.send(sealed).await.unwrap();
    advance(1_000).await;

    let state = screen.state();
    assert_eq!(state.target, Coordinate::from_e7(498_180_162, 240_225_620));
    assert!(state.server_status.is_connected());
}

#[tokio::test(start_paused = true)]
async fn local_feed_needs_a_source() {
    let collaborators = Collaborators {
        permissions: permissions(Ok(PermissionStatus::Denied)),
        geolocation: FakeGeolocation::new(Err(LocationError::Timeout), Err(LocationError::Timeout)),
        coordinates: None,
    };
    let config = ScreenConfig {
        source: TargetSource::LocalFeed { interval_ms: 1_000 },
        ..ScreenConfig::default()
    };

    let err = MapScreen::mount(config, collaborators).await.unwrap_err();
    assert!(matches!(err, ScreenError::MissingFeed));
}
