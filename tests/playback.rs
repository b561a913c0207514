use image::{Rgba, RgbaImage};
use scrollframe::{
    Config, EventKind, ImageSource, LargeConfig, ListenerOptions, LoadProgress, LoadingParams,
    OverlayPainter, PixelSurface, PlaybackEvent, PlaybackState, ScaleMode, ScrollAxis, ScrollFrame,
    ScrollFrameBuilder, ScrollFrameError, ScrollPosition, ScrollSource, Surface,
};
use smol::{LocalExecutor, Timer};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

fn shade(value: u8) -> ImageSource {
    ImageSource::Bitmap(Arc::new(RgbaImage::from_pixel(4, 4, Rgba([value, 0, 0, 255]))))
}

fn fast_config(progressive: bool) -> Config {
    Config {
        exit_animation_frames: 2,
        frame_interval_ms: 1,
        large: LargeConfig {
            enabled: progressive,
            factor: 4,
            show_background_progress: true,
        },
        ..Default::default()
    }
}

struct Harness {
    ex: Rc<LocalExecutor<'static>>,
    surface: Rc<RefCell<PixelSurface>>,
    scroll: Rc<ScrollPosition>,
    frames: Rc<RefCell<Vec<(usize, f64)>>>,
    errors: Rc<RefCell<Vec<ScrollFrameError>>>,
}

impl Harness {
    fn new() -> Self {
        Self {
            ex: Rc::new(LocalExecutor::new()),
            surface: PixelSurface::shared(4, 4),
            scroll: Rc::new(ScrollPosition::new(0.0, 1000.0)),
            frames: Rc::new(RefCell::new(Vec::new())),
            errors: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn builder(&self, progressive: bool) -> ScrollFrameBuilder {
        let frames = self.frames.clone();
        let errors = self.errors.clone();
        ScrollFrame::builder(self.ex.clone())
            .surface(self.surface.clone())
            .scroll_source(self.scroll.clone())
            .scroll_axis(ScrollAxis::Y)
            .linear_mapping()
            .config(fast_config(progressive))
            .on_frame(move |frame, offset| frames.borrow_mut().push((frame, offset)))
            .on_error(move |err| errors.borrow_mut().push(err.clone()))
    }

    fn run<T>(&self, future: impl std::future::Future<Output = T>) -> T {
        smol::block_on(self.ex.run(future))
    }

    fn red(&self) -> u8 {
        self.surface.borrow().pixel(0, 0)[0]
    }

    fn last_frame_event(&self) -> Option<(usize, f64)> {
        self.frames.borrow().last().copied()
    }
}

async fn settle(player: &ScrollFrame) {
    while player.is_background_loading() {
        Timer::after(Duration::from_millis(1)).await;
    }
}

#[test]
fn flat_mode_prunes_absent_frames_and_reclamps() {
    let h = Harness::new();
    let player = h
        .builder(false)
        .images(vec![shade(10), ImageSource::Absent, shade(20)])
        .build()
        .unwrap();

    player.set_frame(2);
    assert_eq!(player.current_frame(), 2);

    h.run(player.init()).unwrap();

    assert_eq!(player.state(), PlaybackState::ReadyIdle);
    assert_eq!(player.total_frames(), 2);
    assert_eq!(player.loaded_frames(), 2);
    assert_eq!(player.current_frame(), 1);
    assert_eq!(h.red(), 20);
    assert!(!player.is_progressive());
}

#[test]
fn set_frame_clamps_to_sequence() {
    let h = Harness::new();
    let player = h
        .builder(false)
        .images((0..100).map(|i| shade(i as u8)).collect())
        .build()
        .unwrap();
    h.run(player.init()).unwrap();

    player.set_frame(-5);
    assert_eq!(player.current_frame(), 0);
    player.set_frame(1000);
    assert_eq!(player.current_frame(), 99);
    assert_eq!(h.red(), 99);
    assert_eq!(h.last_frame_event().map(|(frame, _)| frame), Some(99));
}

#[test]
fn destroy_and_pause_are_idempotent() {
    let h = Harness::new();
    let player = h
        .builder(false)
        .images(vec![shade(1), shade(2), shade(3)])
        .build()
        .unwrap();
    h.run(player.init()).unwrap();

    player.pause();
    assert_eq!(player.state(), PlaybackState::ReadyIdle);

    player.play();
    player.pause();
    player.pause();
    assert_eq!(player.state(), PlaybackState::Paused);

    player.destroy();
    let drawn = h.surface.borrow().frames_drawn();
    player.destroy();
    assert_eq!(player.state(), PlaybackState::Destroyed);

    player.set_frame(2);
    player.play();
    assert_eq!(player.state(), PlaybackState::Destroyed);
    assert_eq!(h.surface.borrow().frames_drawn(), drawn);
    assert!(matches!(h.run(player.init()), Err(ScrollFrameError::Destroyed)));
}

#[test]
fn missing_frame_falls_back_to_next_loaded_one() {
    let h = Harness::new();
    let player = h
        .builder(true)
        .image_factory(11, |index| async move {
            Ok(match index {
                0 | 5 | 10 => shade(index as u8),
                _ => ImageSource::Absent,
            })
        })
        .build()
        .unwrap();

    h.run(async {
        player.init().await.unwrap();
        settle(&player).await;
    });

    // Progressive mode never prunes.
    assert_eq!(player.total_frames(), 11);
    assert_eq!(player.loaded_frames(), 3);

    player.set_frame(3);
    assert_eq!(player.current_frame(), 3);
    assert_eq!(player.drawn_frame(), Some(5));
    assert_eq!(h.red(), 5);
    assert_eq!(h.last_frame_event().map(|(frame, _)| frame), Some(3));
    assert!(h.errors.borrow().is_empty());
}

#[test]
fn scroll_extremes_map_to_first_and_last_frame() {
    let h = Harness::new();
    let completions = Rc::new(RefCell::new(0));
    let seen = completions.clone();
    let player = h
        .builder(false)
        .images((0..10).map(|i| shade(i as u8 * 10)).collect())
        .on_complete(move || *seen.borrow_mut() += 1)
        .build()
        .unwrap();

    h.run(async {
        player.init().await.unwrap();
        player.play();

        assert!(h.scroll.scroll_to(ScrollAxis::Y, 1000.0));
        player.handle_scroll();
        Timer::after(Duration::from_millis(20)).await;
        assert_eq!(h.last_frame_event(), Some((9, 1.0)));
        assert_eq!(*completions.borrow(), 1);

        assert!(h.scroll.scroll_to(ScrollAxis::Y, 0.0));
        player.handle_scroll();
        Timer::after(Duration::from_millis(20)).await;
        assert_eq!(h.last_frame_event(), Some((0, 0.0)));
    });

    assert_eq!(h.red(), 0);
}

#[test]
fn tick_picks_up_scroll_without_notification() {
    let h = Harness::new();
    let player = h
        .builder(false)
        .images((0..5).map(|i| shade(i as u8)).collect())
        .build()
        .unwrap();

    h.run(async {
        player.init().await.unwrap();
        player.play();
        h.scroll.scroll_to(ScrollAxis::Y, 500.0);
        Timer::after(Duration::from_millis(20)).await;
    });

    assert_eq!(player.current_frame(), 2);
    assert_eq!(h.last_frame_event(), Some((2, 0.5)));
}

#[test]
fn stop_rewinds_to_first_frame() {
    let h = Harness::new();
    let player = h
        .builder(false)
        .images((0..4).map(|i| shade(i as u8 + 1)).collect())
        .build()
        .unwrap();
    h.run(player.init()).unwrap();

    player.play();
    player.set_frame(3);
    assert_eq!(h.red(), 4);

    player.stop();
    assert_eq!(player.state(), PlaybackState::Paused);
    assert_eq!(player.current_frame(), 0);
    assert_eq!(h.red(), 1);
    assert_eq!(h.last_frame_event().map(|(frame, _)| frame), Some(0));
}

#[test]
fn failed_init_rejects_and_unlocks_scroll() {
    let h = Harness::new();
    let player = h
        .builder(false)
        .images(vec![
            shade(1),
            ImageSource::from("/definitely/missing/frame.png"),
            shade(3),
        ])
        .build()
        .unwrap();

    let err = h.run(player.init()).unwrap_err();
    assert!(matches!(err, ScrollFrameError::Load { index: 1, .. }));
    assert_eq!(player.state(), PlaybackState::Uninitialized);
    assert!(!h.scroll.is_locked());

    let errors = h.errors.borrow();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].frame_index(), Some(1));
}

#[test]
fn factory_failure_is_a_resolution_error() {
    let h = Harness::new();
    let player = h
        .builder(false)
        .image_factory(3, |index| async move {
            if index == 2 {
                anyhow::bail!("nothing for {}", index);
            }
            Ok(shade(index as u8))
        })
        .build()
        .unwrap();

    let err = h.run(player.init()).unwrap_err();
    assert!(matches!(err, ScrollFrameError::Resolution { index: 2, .. }));
}

#[test]
fn scroll_is_locked_and_reset_while_loading() {
    let h = Harness::new();
    assert!(h.scroll.scroll_to(ScrollAxis::Y, 300.0));

    let scroll = h.scroll.clone();
    let observed = Rc::new(RefCell::new(Vec::new()));
    let log = observed.clone();
    let player = h
        .builder(false)
        .image_factory(3, move |index| {
            log.borrow_mut().push((scroll.is_locked(), scroll.offset(ScrollAxis::Y)));
            async move { Ok(shade(index as u8)) }
        })
        .build()
        .unwrap();

    h.run(player.init()).unwrap();
    assert!(observed.borrow().iter().all(|&(locked, offset)| locked && offset == 0.0));
    assert!(!h.scroll.is_locked());
}

#[test]
fn concurrent_init_reports_already_loading() {
    let h = Harness::new();
    let player = h
        .builder(false)
        .images(vec![shade(1), shade(2)])
        .build()
        .unwrap();

    let (first, second) = h.run(smol::future::zip(player.init(), player.init()));
    assert!(first.is_ok());
    assert!(matches!(second, Err(ScrollFrameError::AlreadyLoading)));

    // Already initialized: resolves straight away.
    assert!(h.run(player.init()).is_ok());
}

#[test]
fn destroy_during_loading_drops_results() {
    let h = Harness::new();
    let player = h
        .builder(false)
        .image_factory(4, |index| async move {
            Timer::after(Duration::from_millis(10)).await;
            Ok(shade(index as u8))
        })
        .build()
        .unwrap();

    let (result, ()) = h.run(smol::future::zip(player.init(), async {
        Timer::after(Duration::from_millis(2)).await;
        player.destroy();
    }));

    assert!(matches!(result, Err(ScrollFrameError::Destroyed)));
    assert_eq!(player.state(), PlaybackState::Destroyed);
    assert_eq!(player.loaded_frames(), 0);
    assert!(!h.scroll.is_locked());
}

#[test]
fn progressive_loading_tracks_both_phases() {
    let h = Harness::new();
    let player = h
        .builder(true)
        .images((0..16).map(|i| shade(i as u8)).collect())
        .build()
        .unwrap();

    h.run(async {
        player.init().await.unwrap();
        assert!(player.is_progressive());
        // Tier 0 for 16 frames at factor 4: 0, 4, 8, 12, 15.
        assert_eq!(player.main_progress(), LoadProgress { count: 5, total: 5 });
        settle(&player).await;
    });

    assert_eq!(player.background_progress(), LoadProgress { count: 11, total: 11 });
    assert_eq!(player.loaded_frames(), 16);
    assert_eq!(player.total_frames(), 16);
}

#[test]
fn custom_main_overlay_sees_final_progress() {
    let h = Harness::new();
    let calls = Rc::new(RefCell::new(Vec::new()));
    let record = calls.clone();
    let painter: OverlayPainter = Rc::new(move |_surface: &mut dyn Surface, params: &LoadingParams| {
        record.borrow_mut().push(params.progress);
    });

    let player = h
        .builder(false)
        .images(vec![shade(1), shade(2), shade(3)])
        .main_loading(painter)
        .build()
        .unwrap();
    h.run(player.init()).unwrap();

    let calls = calls.borrow();
    assert_eq!(calls.first().copied(), Some(0.0));
    assert_eq!(calls.last().copied(), Some(1.0));
}

#[test]
fn listeners_run_by_priority() {
    let h = Harness::new();
    let player = h
        .builder(false)
        .images(vec![shade(1), shade(2)])
        .build()
        .unwrap();

    let order = Rc::new(RefCell::new(Vec::new()));
    for (tag, priority) in [("low", -5), ("high", 5), ("mid", 0)] {
        let order = order.clone();
        player.on(
            EventKind::InitComplete,
            move |_event: &PlaybackEvent| order.borrow_mut().push(tag),
            ListenerOptions::priority(priority),
        );
    }

    h.run(player.init()).unwrap();
    assert_eq!(*order.borrow(), vec!["high", "mid", "low"]);
}

#[test]
fn debounced_frame_listener_gets_last_frame() {
    let h = Harness::new();
    let player = h
        .builder(false)
        .images((0..6).map(|i| shade(i as u8)).collect())
        .build()
        .unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = seen.clone();
    let id = player.on(
        EventKind::Frame,
        move |event: &PlaybackEvent| {
            if let PlaybackEvent::Frame { frame, .. } = event {
                record.borrow_mut().push(*frame);
            }
        },
        ListenerOptions::debounced(Duration::from_millis(15)),
    );

    h.run(async {
        player.init().await.unwrap();
        for frame in 1..6 {
            player.set_frame(frame);
        }
        Timer::after(Duration::from_millis(40)).await;
    });

    assert_eq!(*seen.borrow(), vec![5]);
    assert!(player.off(EventKind::Frame, id));
}

#[test]
fn locator_frames_are_decoded_and_fitted() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..2u8 {
        let path = dir.path().join(format!("frame-{}.png", i));
        RgbaImage::from_pixel(4, 2, Rgba([200 + i, 0, 0, 255])).save(&path).unwrap();
        paths.push(ImageSource::from(path.to_string_lossy().into_owned()));
    }

    let h = Harness {
        surface: PixelSurface::shared(8, 8),
        ..Harness::new()
    };
    let mut config = fast_config(false);
    config.scale_mode = ScaleMode::Contain;
    let player = h.builder(false).config(config).images(paths).build().unwrap();
    h.run(player.init()).unwrap();

    let surface = h.surface.borrow();
    assert_eq!(surface.pixel(4, 4), Rgba([200, 0, 0, 255]));
    // Letterboxed above and below.
    assert_eq!(surface.pixel(4, 0)[3], 0);
    assert_eq!(surface.pixel(4, 7)[3], 0);
}

#[test]
fn invalid_construction_is_rejected() {
    let h = Harness::new();

    let err = h.builder(false).images(vec![shade(1)]).build().unwrap_err();
    assert!(matches!(err, ScrollFrameError::Config(_)));

    let err = h
        .builder(false)
        .images(vec![shade(1), shade(2)])
        .image_factory(2, |i| async move { Ok(shade(i as u8)) })
        .build()
        .unwrap_err();
    assert!(matches!(err, ScrollFrameError::Config(_)));

    // Progressive mode needs at least 2 * factor frames.
    let err = h
        .builder(true)
        .images((0..7).map(|i| shade(i as u8)).collect())
        .build()
        .unwrap_err();
    assert!(matches!(err, ScrollFrameError::Config(_)));
}

#[test]
fn scroll_notifications_are_ignored_unless_playing() {
    let h = Harness::new();
    let player = h
        .builder(false)
        .images((0..10).map(|i| shade(i as u8)).collect())
        .build()
        .unwrap();

    h.run(async {
        player.init().await.unwrap();
        player.play();
        player.pause();

        assert!(h.scroll.scroll_to(ScrollAxis::Y, 1000.0));
        player.handle_scroll();
        assert_eq!(player.current_frame(), 0);

        player.stop();
        player.handle_scroll();
        assert_eq!(player.current_frame(), 0);
    });

    // Resuming picks the new reading up on the next tick.
    h.run(async {
        player.play();
        Timer::after(Duration::from_millis(20)).await;
    });
    assert_eq!(player.current_frame(), 9);
}

#[test]
fn abandoned_init_can_be_retried() {
    let h = Harness::new();
    let player = h
        .builder(false)
        .image_factory(3, |index| async move {
            Timer::after(Duration::from_millis(50)).await;
            Ok(shade(index as u8 + 1))
        })
        .build()
        .unwrap();

    let finished = h.run(smol::future::or(
        async { player.init().await.is_ok() },
        async {
            Timer::after(Duration::from_millis(5)).await;
            false
        },
    ));

    assert!(!finished);
    assert_eq!(player.state(), PlaybackState::Uninitialized);
    assert!(!h.scroll.is_locked());

    h.run(player.init()).unwrap();
    assert_eq!(player.state(), PlaybackState::ReadyIdle);
    assert_eq!(player.loaded_frames(), 3);
}

#[test]
fn background_tier_failure_keeps_playback_alive() {
    let h = Harness::new();
    let player = h
        .builder(true)
        .image_factory(16, |index| async move {
            if index == 2 {
                anyhow::bail!("nothing for {}", index);
            }
            Ok(shade(index as u8))
        })
        .build()
        .unwrap();

    h.run(async {
        player.init().await.unwrap();
        settle(&player).await;
        // Let detached siblings of the failed frame finish.
        Timer::after(Duration::from_millis(5)).await;
    });

    assert_eq!(player.state(), PlaybackState::ReadyIdle);
    assert!(!player.is_background_loading());
    let indices: Vec<_> = h.errors.borrow().iter().map(|err| err.frame_index()).collect();
    assert_eq!(indices, vec![Some(2)]);
    assert!(matches!(h.errors.borrow()[0], ScrollFrameError::Resolution { index: 2, .. }));

    // Tier 0 plus the rest of tier 1; the odd tier never starts.
    assert_eq!(player.loaded_frames(), 8);
    assert!(player.background_progress().count < player.background_progress().total);

    player.set_frame(1);
    assert_eq!(player.drawn_frame(), Some(4));
    assert_eq!(h.red(), 4);
}

#[test]
fn frame_without_fallback_reports_unavailable() {
    let h = Harness::new();
    let player = h
        .builder(true)
        .image_factory(16, |index| async move {
            Ok(if index >= 13 {
                ImageSource::Absent
            } else {
                shade(index as u8)
            })
        })
        .build()
        .unwrap();

    h.run(async {
        player.init().await.unwrap();
        settle(&player).await;
    });
    player.play();

    player.set_frame(14);
    assert_eq!(player.current_frame(), 14);
    {
        let errors = h.errors.borrow();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ScrollFrameError::FrameUnavailable { index: 14 }));
    }
    assert_eq!(player.state(), PlaybackState::Playing);

    player.set_frame(3);
    assert_eq!(h.red(), 3);
    assert_eq!(h.last_frame_event().map(|(frame, _)| frame), Some(3));
}

#[test]
fn repeated_redraws_of_a_missing_frame_report_once() {
    let h = Harness::new();
    let player = h
        .builder(true)
        .image_factory(16, |index| async move {
            if index >= 13 {
                return Ok(ImageSource::Absent);
            }
            if index % 2 == 1 {
                Timer::after(Duration::from_millis(10)).await;
            }
            Ok(shade(index as u8))
        })
        .build()
        .unwrap();

    h.run(async {
        player.init().await.unwrap();
        // Background frames keep landing and forcing redraws of frame 14.
        player.set_frame(14);
        settle(&player).await;
    });

    assert_eq!(player.loaded_frames(), 13);
    let errors = h.errors.borrow();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ScrollFrameError::FrameUnavailable { index: 14 }));
}

#[test]
fn destroy_during_exit_transition_stops_drawing() {
    let h = Harness::new();
    let config = Config {
        exit_animation_frames: 40,
        ..fast_config(false)
    };
    let player = h
        .builder(false)
        .config(config)
        .images((0..3).map(|i| shade(i as u8 + 1)).collect())
        .build()
        .unwrap();

    let (result, drawn_at_destroy) = h.run(smol::future::zip(player.init(), async {
        Timer::after(Duration::from_millis(5)).await;
        player.destroy();
        h.surface.borrow().frames_drawn()
    }));

    assert!(matches!(result, Err(ScrollFrameError::Destroyed)));
    assert_eq!(player.state(), PlaybackState::Destroyed);
    assert_eq!(h.surface.borrow().frames_drawn(), drawn_at_destroy);

    h.run(Timer::after(Duration::from_millis(20)));
    assert_eq!(h.surface.borrow().frames_drawn(), drawn_at_destroy);
    assert!(h.frames.borrow().is_empty());
}
