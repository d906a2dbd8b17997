// src/painter/tests.rs

#[cfg(test)]
mod loop_tests {
    use crate::painter::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;
    use test_log::test; // For logging within tests

    /// Receiver that remembers which texture each frame came from.
    #[derive(Default)]
    struct IdRecorder {
        published: Mutex<Vec<TextureId>>,
    }

    impl IdRecorder {
        fn published(&self) -> Vec<TextureId> {
            self.published.lock().unwrap().clone()
        }
    }

    impl Receiver for IdRecorder {
        fn update(&self, frame: &Texture) {
            self.published.lock().unwrap().push(frame.id());
        }
    }

    fn started() -> (Loop, Arc<IdRecorder>) {
        let recorder = Arc::new(IdRecorder::default());
        let event_loop = Loop::new(recorder.clone());
        event_loop.start(&HeadlessScreen::default()).unwrap();
        (event_loop, recorder)
    }

    /// Operation that logs the texture it ran on and reports `publish`.
    fn tagging_op(
        applied: &Arc<Mutex<Vec<TextureId>>>,
        publish: bool,
    ) -> impl Fn(&mut Texture) -> bool + Send + 'static {
        let applied = applied.clone();
        move |t: &mut Texture| {
            applied.lock().unwrap().push(t.id());
            publish
        }
    }

    fn counter(count: &Arc<AtomicUsize>) -> impl Fn(&mut Texture) -> bool + Send + 'static {
        let count = count.clone();
        move |_: &mut Texture| {
            count.fetch_add(1, Ordering::SeqCst);
            false
        }
    }

    #[test]
    fn roles_alternate_only_on_publishing_steps() {
        let (event_loop, recorder) = started();
        let applied = Arc::new(Mutex::new(Vec::new()));
        let steps = [true, false, false, true, true, false, true];

        for &publish in &steps {
            assert_eq!(
                event_loop.post_direct(tagging_op(&applied, publish)).unwrap(),
                publish
            );
        }

        let applied = applied.lock().unwrap().clone();
        let published = recorder.published();
        let expected_published: Vec<TextureId> = steps
            .iter()
            .zip(&applied)
            .filter(|(p, _)| **p)
            .map(|(_, id)| *id)
            .collect();
        assert_eq!(published, expected_published);

        for i in 1..steps.len() {
            if steps[i - 1] {
                assert_ne!(applied[i], applied[i - 1], "no swap after publish at step {}", i - 1);
            } else {
                assert_eq!(applied[i], applied[i - 1], "swap without publish at step {}", i - 1);
            }
        }
        assert_eq!(event_loop.frames_published(), 4);
        event_loop.request_stop_and_wait().unwrap();
    }

    #[test]
    fn next_step_mutates_previously_published_texture() {
        let (event_loop, recorder) = started();
        let applied = Arc::new(Mutex::new(Vec::new()));

        event_loop.post_direct(tagging_op(&applied, true)).unwrap();
        event_loop.post_direct(tagging_op(&applied, true)).unwrap();
        event_loop.post_direct(tagging_op(&applied, true)).unwrap();

        let applied = applied.lock().unwrap().clone();
        assert_eq!(recorder.published(), applied);
        assert_eq!(applied[0], applied[2]);
        assert_ne!(applied[0], applied[1]);
        event_loop.request_stop_and_wait().unwrap();
    }

    #[test]
    fn queued_operations_publish_through_the_worker() {
        let (event_loop, recorder) = started();
        let applied = Arc::new(Mutex::new(Vec::new()));

        for publish in [false, true, true] {
            event_loop.post(tagging_op(&applied, publish)).unwrap();
        }
        event_loop.request_stop_and_wait().unwrap();

        let applied = applied.lock().unwrap().clone();
        assert_eq!(applied.len(), 3);
        assert_eq!(recorder.published(), vec![applied[1], applied[2]]);
        assert_ne!(applied[1], applied[2]);
    }

    #[test]
    fn queued_operations_apply_in_fifo_order() {
        let (event_loop, _recorder) = started();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..500 {
            let order = order.clone();
            event_loop
                .post(move |_: &mut Texture| {
                    order.lock().unwrap().push(i);
                    i % 7 == 0
                })
                .unwrap();
        }
        event_loop.request_stop_and_wait().unwrap();

        assert_eq!(*order.lock().unwrap(), (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn stop_drains_everything_queued_before_it() {
        const N: usize = 2_000;
        let (event_loop, _recorder) = started();
        let count = Arc::new(AtomicUsize::new(0));

        // Hold the worker up so work piles up in the queue.
        event_loop
            .post(|_: &mut Texture| {
                thread::sleep(Duration::from_millis(20));
                false
            })
            .unwrap();
        for _ in 0..N {
            event_loop.post(counter(&count)).unwrap();
        }

        event_loop.request_stop_and_wait().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), N);
        assert_eq!(event_loop.pending(), 0);
        assert_eq!(event_loop.state(), LoopState::Stopped);
    }

    #[test]
    fn stop_on_idle_loop_returns() {
        let (event_loop, recorder) = started();
        // Let the worker park on the empty queue first.
        thread::sleep(Duration::from_millis(10));
        event_loop.request_stop_and_wait().unwrap();
        assert_eq!(event_loop.state(), LoopState::Stopped);
        assert!(recorder.published().is_empty());
    }

    #[test]
    fn lifecycle_is_enforced() {
        let recorder = Arc::new(IdRecorder::default());
        let event_loop = Loop::new(recorder);
        assert_eq!(event_loop.state(), LoopState::Idle);

        assert!(matches!(
            event_loop.post(DrawOp::Update),
            Err(LoopError::NotRunning(LoopState::Idle))
        ));
        assert!(matches!(
            event_loop.post_direct(DrawOp::Update),
            Err(LoopError::NotRunning(LoopState::Idle))
        ));
        assert!(matches!(
            event_loop.request_stop_and_wait(),
            Err(LoopError::NotRunning(LoopState::Idle))
        ));

        let screen = HeadlessScreen::default();
        event_loop.start(&screen).unwrap();
        assert_eq!(event_loop.state(), LoopState::Running);
        assert!(matches!(
            event_loop.start(&screen),
            Err(LoopError::AlreadyStarted)
        ));

        event_loop.request_stop_and_wait().unwrap();
        assert!(matches!(
            event_loop.request_stop_and_wait(),
            Err(LoopError::NotRunning(LoopState::Stopped))
        ));
        assert!(matches!(
            event_loop.post(DrawOp::Update),
            Err(LoopError::NotRunning(LoopState::Stopped))
        ));
        assert!(matches!(
            event_loop.post_direct(DrawOp::Update),
            Err(LoopError::NotRunning(LoopState::Stopped))
        ));
    }

    #[test]
    fn failed_allocation_leaves_loop_idle() {
        struct BrokenScreen;
        impl Screen for BrokenScreen {
            fn new_texture(&self, _size: Size) -> anyhow::Result<Texture> {
                anyhow::bail!("out of video memory")
            }
        }

        let event_loop = Loop::new(Arc::new(IdRecorder::default()));
        let err = event_loop.start(&BrokenScreen).unwrap_err();
        assert!(matches!(err, LoopError::Backend(_)));
        assert!(err.to_string().contains("out of video memory"));
        assert_eq!(event_loop.state(), LoopState::Idle);
    }

    #[test]
    fn direct_and_queued_applies_never_overlap() {
        let (event_loop, _recorder) = started();
        let event_loop = Arc::new(event_loop);
        let busy = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let guarded = {
            let busy = busy.clone();
            let overlaps = overlaps.clone();
            move |publish: bool| {
                let busy = busy.clone();
                let overlaps = overlaps.clone();
                move |_: &mut Texture| {
                    if busy.swap(true, Ordering::SeqCst) {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::yield_now();
                    busy.store(false, Ordering::SeqCst);
                    publish
                }
            }
        };

        let producer = {
            let event_loop = event_loop.clone();
            let guarded = guarded.clone();
            thread::spawn(move || {
                for i in 0..300 {
                    event_loop.post(guarded(i % 2 == 0)).unwrap();
                }
            })
        };
        for i in 0..300 {
            event_loop.post_direct(guarded(i % 3 == 0)).unwrap();
        }
        producer.join().unwrap();
        event_loop.request_stop_and_wait().unwrap();

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        // 150 queued + 100 direct publishes.
        assert_eq!(event_loop.frames_published(), 250);
    }

    #[test]
    fn every_accepted_post_is_applied_when_stopping_under_load() {
        let (event_loop, _recorder) = started();
        let event_loop = Arc::new(event_loop);
        let count = Arc::new(AtomicUsize::new(0));
        let accepted = Arc::new(AtomicUsize::new(0));

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let event_loop = event_loop.clone();
                let count = count.clone();
                let accepted = accepted.clone();
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        match event_loop.post(counter(&count)) {
                            Ok(()) => {
                                accepted.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(LoopError::NotRunning(LoopState::Stopped)) => break,
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(2));
        event_loop.request_stop_and_wait().unwrap();
        for p in producers {
            p.join().unwrap();
        }

        assert_eq!(
            count.load(Ordering::SeqCst),
            accepted.load(Ordering::SeqCst)
        );
    }

    #[test]
    fn worker_panic_is_reported_on_stop() {
        let (event_loop, _recorder) = started();
        event_loop
            .post(|_: &mut Texture| -> bool { panic!("operation exploded") })
            .unwrap();

        assert!(matches!(
            event_loop.request_stop_and_wait(),
            Err(LoopError::WorkerPanicked)
        ));
        assert_eq!(event_loop.state(), LoopState::Stopped);
    }

    #[test]
    fn worker_keeps_draining_after_an_operation_panics() {
        let (event_loop, recorder) = started();
        let count = Arc::new(AtomicUsize::new(0));

        event_loop
            .post(|_: &mut Texture| -> bool { panic!("operation exploded") })
            .unwrap();
        thread::sleep(Duration::from_millis(20));
        for _ in 0..10 {
            event_loop.post(counter(&count)).unwrap();
        }
        event_loop.post(DrawOp::Update).unwrap();

        // Applied by the worker, without anyone stopping the loop.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while recorder.published().is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(count.load(Ordering::SeqCst), 10);
        assert_eq!(recorder.published().len(), 1);
        assert_eq!(event_loop.pending(), 0);
        assert_eq!(event_loop.state(), LoopState::Running);

        assert!(matches!(
            event_loop.request_stop_and_wait(),
            Err(LoopError::WorkerPanicked)
        ));
    }

    #[test]
    fn stop_waits_for_direct_apply_in_progress() {
        let (event_loop, recorder) = started();
        let event_loop = Arc::new(event_loop);
        let entered = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        let direct = {
            let event_loop = event_loop.clone();
            let entered = entered.clone();
            let finished = finished.clone();
            thread::spawn(move || {
                event_loop.post_direct(move |_: &mut Texture| {
                    entered.store(true, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(50));
                    finished.store(true, Ordering::SeqCst);
                    true
                })
            })
        };
        while !entered.load(Ordering::SeqCst) {
            thread::yield_now();
        }

        event_loop.request_stop_and_wait().unwrap();
        // Nothing is applied or published after stop returns.
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(recorder.published().len(), 1);
        assert!(direct.join().unwrap().unwrap());
        assert!(matches!(
            event_loop.post_direct(DrawOp::Update),
            Err(LoopError::NotRunning(LoopState::Stopped))
        ));
        assert_eq!(event_loop.frames_published(), 1);
    }

    #[test]
    fn dropping_a_running_loop_drains_it() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let (event_loop, _recorder) = started();
            for _ in 0..100 {
                event_loop.post(counter(&count)).unwrap();
            }
        }
        assert_eq!(count.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn published_frame_carries_into_next_texture() {
        let (event_loop, _recorder) = started();
        event_loop
            .post_direct(DrawOp::Fill(Background::Green))
            .unwrap();
        event_loop
            .post_direct(DrawOp::Figure(Point::new(100, 100)))
            .unwrap();
        assert!(event_loop.post_direct(DrawOp::Update).unwrap());

        let scene = Arc::new(Mutex::new(None));
        {
            let scene = scene.clone();
            event_loop
                .post_direct(move |t: &mut Texture| {
                    *scene.lock().unwrap() = Some(t.scene().clone());
                    false
                })
                .unwrap();
        }

        let scene = scene.lock().unwrap().clone().unwrap();
        assert_eq!(scene.background, Some(Background::Green));
        assert_eq!(scene.figures, vec![Point::new(100, 100)]);
        event_loop.request_stop_and_wait().unwrap();
    }
}
