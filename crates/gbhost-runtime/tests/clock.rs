mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use common::{PickyHost, ScriptedCore, StubbornHost};
use gbhost_runtime::{
    AudioSpec, Button, ClockSource, ClockState, CoreSetting, JoypadSnapshot, ManualHost,
    RuntimeError, frame_channel,
};
use proptest::prelude::*;

fn running_clock(amplitude: f32) -> (ClockSource, gbhost_runtime::ManualPump, Arc<common::Probe>) {
    let host = ManualHost::new();
    let pump = host.pump();
    let (writer, _reader) = frame_channel();
    let mut clock = ClockSource::new(Box::new(host), AudioSpec::default(), writer);
    let (core, probe) = ScriptedCore::with_amplitude(amplitude);
    clock.install_core(Box::new(core)).expect("install");
    clock.open().expect("open");
    clock.resume().expect("resume");
    (clock, pump, probe)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn fills_exactly_the_requested_samples(pairs in 0usize..4096, amplitude in 0.0f32..50.0) {
        let (_clock, pump, probe) = running_clock(amplitude);
        let mut buf = vec![f32::NAN; pairs * 2];
        prop_assert!(pump.pull_into(&mut buf));
        prop_assert_eq!(probe.cycles(), pairs as u64);
        prop_assert!(buf.iter().all(|s| (-1.0..=1.0).contains(s)));
    }
}

#[test]
fn uninitialized_core_yields_silence() {
    let host = ManualHost::new();
    let pump = host.pump();
    let (writer, _reader) = frame_channel();
    let mut clock = ClockSource::new(Box::new(host), AudioSpec::default(), writer);
    clock.open().expect("open");
    clock.resume().expect("resume");

    let buf = pump.pull().expect("device playing");
    assert_eq!(buf.len(), AudioSpec::default().buffer_len());
    assert!(buf.iter().all(|s| *s == 0.0));
    assert_eq!(clock.silent_pulls(), 1);
}

#[test]
fn gain_is_applied() {
    let (clock, pump, _probe) = running_clock(1.0);
    let buf = pump.pull().expect("device playing");
    let peak = buf.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(peak <= gbhost_runtime::OUTPUT_GAIN + 1e-6);
    assert!(peak > 0.0);
    assert_eq!(clock.samples_delivered(), buf.len() as u64);
}

#[test]
fn opens_paused() {
    let host = ManualHost::new();
    let pump = host.pump();
    let (writer, _reader) = frame_channel();
    let mut clock = ClockSource::new(Box::new(host), AudioSpec::default(), writer);
    assert_eq!(clock.state(), ClockState::Uninitialized);
    assert!(matches!(clock.pause(), Err(RuntimeError::ClockNotOpen)));
    clock.open().expect("open");
    assert_eq!(clock.state(), ClockState::Paused);
    assert!(pump.pull().is_none());
}

#[test]
fn startup_failure_is_reported() {
    let host = ManualHost::new();
    host.fail_open(true);
    let (writer, _reader) = frame_channel();
    let mut clock = ClockSource::new(Box::new(host), AudioSpec::default(), writer);
    assert!(matches!(
        clock.open(),
        Err(RuntimeError::StartupFailure { .. })
    ));
    assert_eq!(clock.state(), ClockState::Uninitialized);
}

#[test]
fn pause_halts_collection_even_if_device_keeps_calling() {
    let host = StubbornHost::default();
    let (writer, _reader) = frame_channel();
    let mut clock = ClockSource::new(Box::new(host.clone()), AudioSpec::default(), writer);
    let (core, probe) = ScriptedCore::new();
    clock.install_core(Box::new(core)).expect("install");
    clock.open().expect("open");
    clock.resume().expect("resume");

    host.pull(1024).expect("callback");
    assert_eq!(probe.collect_calls(), 1);

    clock.pause().expect("pause");
    for _ in 0..10 {
        let buf = host.pull(1024).expect("callback");
        assert!(buf.iter().all(|s| *s == 0.0));
    }
    assert_eq!(probe.collect_calls(), 1);

    clock.resume().expect("resume");
    host.pull(1024).expect("callback");
    assert_eq!(probe.collect_calls(), 2);
}

#[test]
fn pause_waits_out_in_flight_callbacks() {
    let (mut clock, pump, probe) = running_clock(1.0);
    let stop = Arc::new(AtomicBool::new(false));
    let pumper = {
        let pump = pump.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            let mut buf = vec![0.0; 1024];
            while !stop.load(Ordering::SeqCst) {
                pump.pull_into(&mut buf);
                thread::yield_now();
            }
        })
    };

    while probe.collect_calls() < 5 {
        thread::yield_now();
    }
    clock.pause().expect("pause");
    let frozen = probe.collect_calls();
    let cycles = probe.cycles();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(probe.collect_calls(), frozen);
    assert_eq!(probe.cycles(), cycles);

    clock.resume().expect("resume");
    while probe.collect_calls() == frozen {
        thread::yield_now();
    }

    stop.store(true, Ordering::SeqCst);
    pumper.join().expect("pumper");
}

#[test]
fn joypad_reaches_core_before_pull() {
    let (clock, pump, probe) = running_clock(1.0);
    let pad = JoypadSnapshot::RELEASED
        .with(Button::A, true)
        .with(Button::Left, true);
    clock.publish_joypad(pad);
    pump.pull().expect("pull");
    assert_eq!(probe.inputs.load(Ordering::SeqCst), u64::from(pad.bits()));
}

#[test]
fn settings_apply_without_pausing() {
    let (clock, pump, probe) = running_clock(1.0);
    clock.send_setting(CoreSetting::Volume(0.5));
    assert_eq!(clock.state(), ClockState::Running);
    pump.pull().expect("pull");
    assert_eq!(probe.volume_milli.load(Ordering::SeqCst), 500);
    assert_eq!(clock.silent_pulls(), 0);
}

#[test]
fn sample_rate_change_rebuilds_device() {
    let (mut clock, pump, probe) = running_clock(1.0);
    pump.pull().expect("pull");
    let cycles = probe.cycles();
    assert_eq!(pump.opened(), 1);

    clock.set_sample_rate(22_050).expect("rebuild");
    assert_eq!(pump.opened(), 2);
    assert_eq!(clock.state(), ClockState::Running);
    assert_eq!(pump.spec().map(|s| s.sample_rate), Some(22_050));
    assert_eq!(probe.sample_rate.load(Ordering::SeqCst), 22_050);
    // Emulation state carries over the rebuild.
    assert_eq!(probe.cycles(), cycles);

    pump.pull().expect("pull after rebuild");
    assert!(probe.cycles() > cycles);
}

#[test]
fn sample_rate_change_keeps_paused_clock_paused() {
    let (mut clock, pump, _probe) = running_clock(1.0);
    clock.pause().expect("pause");
    clock.set_sample_rate(48_000).expect("rebuild");
    assert_eq!(clock.state(), ClockState::Paused);
    assert!(pump.pull().is_none());
}

#[test]
fn failed_rate_change_restores_previous_device() {
    let host = PickyHost {
        inner: ManualHost::new(),
        refused_rate: 22_050,
    };
    let pump = host.inner.pump();
    let (writer, _reader) = frame_channel();
    let mut clock = ClockSource::new(Box::new(host), AudioSpec::default(), writer);
    let (core, probe) = ScriptedCore::new();
    clock.install_core(Box::new(core)).expect("install");
    clock.open().expect("open");
    clock.resume().expect("resume");

    assert!(matches!(
        clock.set_sample_rate(22_050),
        Err(RuntimeError::StartupFailure { .. })
    ));
    assert_eq!(clock.state(), ClockState::Running);
    assert_eq!(clock.spec().sample_rate, 44_100);
    assert_eq!(pump.spec().map(|s| s.sample_rate), Some(44_100));
    assert_eq!(probe.sample_rate.load(Ordering::SeqCst), 44_100);
    pump.pull().expect("still running at the old rate");
}

#[test]
fn resume_reopens_a_lost_device() {
    let host = ManualHost::new();
    let pump = host.pump();
    let (writer, _reader) = frame_channel();
    let mut clock = ClockSource::new(Box::new(host.clone()), AudioSpec::default(), writer);
    clock.open().expect("open");
    clock.resume().expect("resume");

    host.fail_open(true);
    assert!(clock.set_sample_rate(48_000).is_err());
    assert_eq!(clock.state(), ClockState::Paused);
    assert!(!pump.is_open());
    assert!(clock.resume().is_err());

    host.fail_open(false);
    clock.resume().expect("resume after device returns");
    assert_eq!(clock.state(), ClockState::Running);
    assert_eq!(pump.spec().map(|s| s.sample_rate), Some(44_100));
    pump.pull().expect("playing");
}

#[test]
fn rejects_unsupported_sample_rate() {
    let (mut clock, pump, _probe) = running_clock(1.0);
    assert!(matches!(
        clock.set_sample_rate(12_345),
        Err(RuntimeError::UnsupportedSampleRate { rate: 12_345 })
    ));
    assert_eq!(pump.opened(), 1);
    assert_eq!(clock.state(), ClockState::Running);
}

#[test]
fn shutdown_returns_core_and_closes_device() {
    let (mut clock, pump, _probe) = running_clock(1.0);
    assert!(clock.shutdown().is_some());
    assert_eq!(clock.state(), ClockState::Destroyed);
    assert!(!pump.is_open());
    assert!(matches!(clock.resume(), Err(RuntimeError::ClockDestroyed)));
}
