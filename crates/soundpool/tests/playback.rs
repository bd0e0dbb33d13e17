// Transport behavior of loaded samples driven through the pool

mod common;

use common::{expected_frames, frame_value, wait_until, Harness, Script};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_short_clip_plays_once_then_stops() {
    let h = Harness::new(4);
    let clip = Script::clip(2_080);
    h.resolver.add("click", clip.clone());
    let id = h.load_ready("click", None, false);
    assert!(h.pool.is_stopped(id));

    let started = Instant::now();
    assert_eq!(h.pool.play(id, 1.0, 1.0, 0, 1.0), Some(id));
    assert!(h.pool.is_playing(id));

    assert!(wait_until(Duration::from_secs(3), || h.pool.is_stopped(id)));
    assert!(started.elapsed() >= clip.duration() - Duration::from_millis(40));
    assert!(!h.pool.is_playing(id));
    assert!(!h.pool.is_paused(id));
    assert!(h.pool.is_loaded(id));

    let probe = h.sinks.last().unwrap();
    assert_eq!(probe.played(), expected_frames(0..2_080));
}

#[test]
fn test_streaming_loop_keeps_playing() {
    let h = Harness::new(4);
    let clip = Script::clip(2_000);
    h.resolver.add("ambient", clip.clone());
    let id = h.load_ready("ambient", Some(1_000), false);

    let sample = h.pool.sample(id).unwrap();
    assert!(!sample.is_fully_buffered());

    assert_eq!(h.pool.play(id, 0.5, 0.5, -1, 1.0), Some(id));
    thread::sleep(clip.duration() * 3 + Duration::from_millis(100));
    assert!(h.pool.is_playing(id));
    assert!(h.decoders.seeks.load(Ordering::SeqCst) >= 2);
    // Streaming mode drops its buffer after the first pass
    assert_eq!(sample.buffered_bytes(), 0);

    let played = h.sinks.last().unwrap().played();
    assert!(played.len() > 4_000);
    for (i, value) in played.iter().enumerate() {
        assert_eq!(*value, frame_value(i % 2_000), "discontinuity at frame {}", i);
    }

    assert!(h.pool.stop(id));
    assert!(h.pool.is_stopped(id));
}

#[test]
fn test_static_partial_sample_becomes_fully_buffered() {
    let h = Harness::new(4);
    h.resolver.add("pad", Script::clip(3_000));
    let id = h.load_ready("pad", Some(1_000), true);

    let sample = h.pool.sample(id).unwrap();
    assert!(sample.is_static());
    assert!(!sample.is_fully_buffered());

    assert_eq!(h.pool.play(id, 1.0, 1.0, 1, 1.0), Some(id));
    assert!(wait_until(Duration::from_secs(3), || sample.is_fully_buffered()));
    assert_eq!(sample.buffered_bytes(), 6_000);
    assert!(wait_until(Duration::from_secs(3), || h.pool.is_stopped(id)));

    // Second pass came from memory
    assert_eq!(h.decoders.seeks.load(Ordering::SeqCst), 0);
    assert!(h.decoders.released.load(Ordering::SeqCst) >= 1);
    let mut expected = expected_frames(0..3_000);
    expected.extend(expected_frames(0..3_000));
    assert_eq!(h.sinks.last().unwrap().played(), expected);
}

#[test]
fn test_large_static_request_streams() {
    let h = Harness::new(4);
    let mut clip = Script::clip(2_000);
    clip.declared_size = Some(200 * 1024);
    h.resolver.add("huge", clip);
    let id = h.load_ready("huge", Some(1_000), true);

    let sample = h.pool.sample(id).unwrap();
    assert!(!sample.is_static());
    assert!(!sample.is_fully_buffered());
}

#[test]
fn test_stop_then_play_restarts_from_beginning() {
    let h = Harness::new(4);
    h.resolver.add("voice", Script::clip(4_000));
    let id = h.load_ready("voice", None, false);

    h.pool.play(id, 1.0, 1.0, 0, 1.0).unwrap();
    thread::sleep(Duration::from_millis(150));
    assert!(h.pool.stop(id));
    assert!(h.pool.is_stopped(id));
    assert!(!h.pool.stop(id));

    h.pool.play(id, 1.0, 1.0, 0, 1.0).unwrap();
    assert!(wait_until(Duration::from_secs(3), || h.pool.is_stopped(id)));

    let segments = h.sinks.last().unwrap().segments();
    assert!(segments.len() >= 2);
    assert_eq!(segments[0][0], frame_value(0));
    assert_eq!(segments.last().unwrap(), &expected_frames(0..4_000));
}

#[test]
fn test_pause_resume_is_seamless() {
    let h = Harness::new(4);
    h.resolver.add("melody", Script::clip(4_000));
    let id = h.load_ready("melody", None, false);

    h.pool.play(id, 1.0, 1.0, 0, 1.0).unwrap();
    thread::sleep(Duration::from_millis(150));
    assert!(h.pool.pause(id));
    assert!(h.pool.is_paused(id));
    assert!(!h.pool.is_playing(id));
    assert!(!h.pool.pause(id));

    let sample = h.pool.sample(id).unwrap();
    assert!(sample.paused_offset() > 0);
    assert_eq!(sample.paused_offset() % 2, 0);

    thread::sleep(Duration::from_millis(50));
    assert!(h.pool.resume(id));
    assert!(h.pool.is_playing(id));
    assert!(!h.pool.resume(id));
    assert!(wait_until(Duration::from_secs(3), || h.pool.is_stopped(id)));

    assert_eq!(h.sinks.last().unwrap().played(), expected_frames(0..4_000));
}

#[test]
fn test_pause_across_loop_wrap_keeps_remaining_plays() {
    let h = Harness::new(4);
    h.resolver.add("tick", Script::clip(800));
    let id = h.load_ready("tick", None, false);

    h.pool.play(id, 1.0, 1.0, 2, 1.0).unwrap();
    thread::sleep(Duration::from_millis(150));
    assert!(h.pool.pause(id));
    thread::sleep(Duration::from_millis(30));
    assert!(h.pool.resume(id));
    assert!(wait_until(Duration::from_secs(3), || h.pool.is_stopped(id)));

    let mut expected = Vec::new();
    for _ in 0..3 {
        expected.extend(expected_frames(0..800));
    }
    assert_eq!(h.sinks.last().unwrap().played(), expected);
}

#[test]
fn test_play_from_paused_starts_over() {
    let h = Harness::new(4);
    h.resolver.add("voice", Script::clip(4_000));
    let id = h.load_ready("voice", None, false);

    h.pool.play(id, 1.0, 1.0, 0, 1.0).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(h.pool.pause(id));
    assert_eq!(h.pool.play(id, 1.0, 1.0, 0, 1.0), Some(id));
    assert!(wait_until(Duration::from_secs(3), || h.pool.is_stopped(id)));

    let segments = h.sinks.last().unwrap().segments();
    assert_eq!(segments.last().unwrap(), &expected_frames(0..4_000));
}

#[test]
fn test_play_while_playing_is_rejected() {
    let h = Harness::new(4);
    h.resolver.add("voice", Script::clip(4_000));
    let id = h.load_ready("voice", None, false);

    assert_eq!(h.pool.play(id, 1.0, 1.0, 0, 1.0), Some(id));
    assert_eq!(h.pool.play(id, 1.0, 1.0, 0, 1.0), None);
    assert!(h.pool.stop(id));
}

#[test]
fn test_states_are_mutually_exclusive() {
    let h = Harness::new(4);
    h.resolver.add("voice", Script::clip(2_000));
    let id = h.load_ready("voice", None, false);

    let exclusive = |h: &Harness| {
        let flags = [h.pool.is_playing(id), h.pool.is_paused(id), h.pool.is_stopped(id)];
        flags.iter().filter(|f| **f).count() == 1
    };
    assert!(exclusive(&h));
    h.pool.play(id, 1.0, 1.0, -1, 1.0).unwrap();
    for _ in 0..20 {
        assert!(exclusive(&h));
        thread::sleep(Duration::from_millis(5));
    }
    h.pool.pause(id);
    assert!(exclusive(&h));
    h.pool.resume(id);
    assert!(exclusive(&h));
    h.pool.stop(id);
    assert!(exclusive(&h));
}

#[test]
fn test_rate_speeds_up_playback() {
    let h = Harness::new(4);
    let clip = Script::clip(4_000);
    h.resolver.add("voice", clip.clone());
    let id = h.load_ready("voice", None, false);

    let started = Instant::now();
    h.pool.play(id, 1.0, 1.0, 0, 2.0).unwrap();
    assert!(wait_until(Duration::from_secs(3), || h.pool.is_stopped(id)));
    assert!(started.elapsed() < clip.duration());
    assert_eq!(h.sinks.last().unwrap().rate(), 2.0);
}

#[test]
fn test_play_once_reports_playing_then_unloads() {
    let h = Harness::new(4);
    let clip = Script::clip(2_000);
    h.resolver.add("blip", clip.clone());

    let id = h.pool.play_once("blip", 1.0, 1.0, 1.0).unwrap();
    assert!(h.pool.is_playing(id));
    assert!(h.pool.is_any_playing());
    assert_eq!(h.pool.loaded_count(), 1);

    assert!(wait_until(clip.duration() + Duration::from_secs(2), || !h.pool.is_loaded(id)));
    assert!(wait_until(Duration::from_secs(1), || !h.pool.is_any_playing()));
    assert_eq!(h.pool.loaded_count(), 0);
    assert!(!h.pool.is_playing(id));
    assert_eq!(h.sinks.last().unwrap().played(), expected_frames(0..2_000));
}

#[test]
fn test_play_once_pause_is_terminal() {
    let h = Harness::new(4);
    h.resolver.add("blip", Script::clip(8_000));

    let id = h.pool.play_once("blip", 1.0, 1.0, 1.0).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(h.pool.pause(id));
    assert!(!h.pool.resume(id));
    assert!(wait_until(Duration::from_secs(2), || !h.pool.is_loaded(id)));
    assert!(!h.pool.is_playing(id));
    assert!(!h.pool.resume(id));
}

#[test]
fn test_play_once_with_missing_source_frees_slot() {
    let h = Harness::new(1);
    let id = h.pool.play_once("nowhere", 1.0, 1.0, 1.0).unwrap();
    assert!(wait_until(Duration::from_secs(2), || h.pool.loaded_count() == 0));
    assert!(!h.pool.is_playing(id));
    assert!(h.pool.play_once("", 1.0, 1.0, 1.0).is_none());
}

#[test]
fn test_auto_pause_and_resume_cover_all_samples() {
    let h = Harness::new(4);
    h.resolver.add("a", Script::clip(2_000));
    h.resolver.add("b", Script::clip(3_000));
    let a = h.load_ready("a", None, false);
    let b = h.load_ready("b", None, false);
    let idle = h.load_ready("a", None, false);

    h.pool.play(a, 1.0, 1.0, -1, 1.0).unwrap();
    h.pool.play(b, 1.0, 1.0, -1, 1.0).unwrap();
    thread::sleep(Duration::from_millis(50));

    h.pool.auto_pause();
    assert!(h.pool.is_paused(a));
    assert!(h.pool.is_paused(b));
    assert!(h.pool.is_stopped(idle));
    assert!(!h.pool.is_any_playing());

    h.pool.auto_resume();
    assert!(h.pool.is_playing(a));
    assert!(h.pool.is_playing(b));
    assert!(h.pool.is_stopped(idle));

    h.pool.release();
    assert!(!h.pool.is_any_playing());
}

#[test]
fn test_streaming_pause_while_decoding_is_seamless() {
    let h = Harness::new(4);
    h.resolver.add("speech", Script::clip(4_000));
    let id = h.load_ready("speech", Some(1_000), false);
    assert!(!h.pool.sample(id).unwrap().is_fully_buffered());

    h.pool.play(id, 1.0, 1.0, 0, 1.0).unwrap();
    thread::sleep(Duration::from_millis(200));
    assert!(h.pool.pause(id));
    thread::sleep(Duration::from_millis(30));
    assert!(h.pool.resume(id));
    assert!(wait_until(Duration::from_secs(3), || h.pool.is_stopped(id)));

    assert_eq!(h.sinks.last().unwrap().played(), expected_frames(0..4_000));
}

#[test]
fn test_streaming_stop_while_decoding_restarts_from_beginning() {
    let h = Harness::new(4);
    h.resolver.add("speech", Script::clip(4_000));
    let id = h.load_ready("speech", Some(1_000), false);

    h.pool.play(id, 1.0, 1.0, 0, 1.0).unwrap();
    thread::sleep(Duration::from_millis(200));
    assert!(h.pool.stop(id));
    assert_eq!(h.pool.sample(id).unwrap().buffered_bytes(), 0);

    h.pool.play(id, 1.0, 1.0, 0, 1.0).unwrap();
    assert!(wait_until(Duration::from_secs(3), || h.pool.is_stopped(id)));

    let segments = h.sinks.last().unwrap().segments();
    let last = segments.last().unwrap();
    assert_eq!(last[0], frame_value(0));
    assert_eq!(last, &expected_frames(0..4_000));
    assert!(h.decoders.seeks.load(Ordering::SeqCst) >= 1);
}
