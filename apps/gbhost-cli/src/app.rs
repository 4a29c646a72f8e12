use std::{
    path::Path,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, TryRecvError};
use gbhost_config::{Palette, SettingsStore};
use gbhost_input::{
    GamepadStateReader, GamepadStateWriter, InputAggregator, KeyboardHeldSet, Rebind, RebindModal,
    gamepad_state,
};
use gbhost_runtime::{
    AudioHost, AudioSpec, CoreInit, CoreSetting, CpalHost, FpsCounter, FramePacer, LoadOutcome,
    ManualHost, ManualPump, PaletteTarget, Presenter, Session, SessionConfig, SlotIndex,
};

use crate::{
    args::Args,
    commands::{self, Command},
    surface::HeadlessSurface,
    test_pattern::TestPatternCore,
};

/// How often a gamepad rebind capture samples the pad.
const CAPTURE_POLL: Duration = Duration::from_millis(5);

/// Stands in for the sound card when running with `--no-audio`: pulls
/// roughly one presentation period worth of samples per loop iteration.
struct FrameClockedAudio {
    pump: ManualPump,
    buf: Vec<f32>,
    owed_frames: f64,
}

impl FrameClockedAudio {
    fn drive(&mut self, elapsed: Duration) {
        // Time spent paused is not owed to the core.
        let Some(spec) = self.pump.spec().filter(|_| self.pump.is_playing()) else {
            self.owed_frames = 0.0;
            return;
        };
        if self.buf.len() != spec.buffer_len() {
            self.buf.resize(spec.buffer_len(), 0.0);
        }
        self.owed_frames += elapsed.as_secs_f64() * f64::from(spec.sample_rate);
        while self.owed_frames >= f64::from(spec.buffer_frames) {
            if !self.pump.pull_into(&mut self.buf) {
                self.owed_frames = 0.0;
                return;
            }
            self.owed_frames -= f64::from(spec.buffer_frames);
        }
    }
}

pub struct App {
    args: Args,
    store: SettingsStore,
    session: Session,
    presenter: Presenter<HeadlessSurface>,
    keyboard: KeyboardHeldSet,
    aggregator: InputAggregator,
    gamepad: GamepadStateReader,
    #[cfg(feature = "gamepad")]
    poller: Option<gbhost_input::GamepadPoller>,
    rebind: RebindModal,
    commands: Receiver<Command>,
    audio: Option<FrameClockedAudio>,
    fps: FpsCounter,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let store = SettingsStore::open(&args.config_dir)?;
        let settings = store.settings().clone();

        let spec = AudioSpec {
            buffer_frames: args.buffer,
            ..AudioSpec::default()
        }
        .with_sample_rate(args.sample_rate)?;

        let (host, audio): (Box<dyn AudioHost>, _) = if args.no_audio {
            let host = ManualHost::new();
            let audio = FrameClockedAudio {
                pump: host.pump(),
                buf: vec![0.0; spec.buffer_len()],
                owed_frames: 0.0,
            };
            (Box::new(host) as Box<dyn AudioHost>, Some(audio))
        } else {
            (Box::new(CpalHost::new()) as Box<dyn AudioHost>, None)
        };

        let core = TestPatternCore::new(CoreInit {
            save_dir: settings.paths.saves_dir.clone(),
            boot_rom_path: settings.paths.boot_rom.clone(),
        });
        let (session, reader) = Session::start(
            host,
            Box::new(core),
            SessionConfig {
                audio: spec,
                save_states_dir: settings.paths.save_states_dir.clone(),
            },
        )
        .context("starting session")?;
        for setting in settings.core_settings() {
            session.send_setting(setting);
        }

        let mut presenter = Presenter::new(reader, HeadlessSurface::new());
        if let Some(scale) = args.scale {
            presenter.set_scale(scale)?;
        }

        let (writer, gamepad) = gamepad_state();
        let aggregator = InputAggregator::new(settings.bindings.clone(), gamepad.clone());
        #[cfg(feature = "gamepad")]
        let poller = spawn_gamepad(writer, args.no_gamepad);
        #[cfg(not(feature = "gamepad"))]
        drop::<GamepadStateWriter>(writer);

        let (tx, commands) = crossbeam_channel::unbounded();
        commands::spawn_stdin(tx).context("spawning stdin reader")?;

        let mut app = Self {
            args,
            store,
            session,
            presenter,
            keyboard: KeyboardHeldSet::new(),
            aggregator,
            gamepad,
            #[cfg(feature = "gamepad")]
            poller,
            rebind: RebindModal::new(),
            commands,
            audio,
            fps: FpsCounter::new(Instant::now()),
        };

        if let Some(rom) = app.args.rom.clone() {
            app.insert(&rom);
        }
        Ok(app)
    }

    pub fn run(&mut self) -> Result<()> {
        let mut pacer = FramePacer::new(self.args.fps);
        let deadline = self
            .args
            .seconds
            .map(|s| Instant::now() + Duration::from_secs_f64(s.max(0.0)));
        let mut last = Instant::now();

        'frames: loop {
            loop {
                match self.commands.try_recv() {
                    Ok(Command::Quit) => break 'frames,
                    Ok(cmd) => {
                        if let Err(e) = self.handle(cmd) {
                            tracing::warn!("{e:#}");
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    // Without stdin the run ends only through the deadline.
                    Err(TryRecvError::Disconnected) if deadline.is_some() => break,
                    Err(TryRecvError::Disconnected) => break 'frames,
                }
            }

            if let Some(rebind) = self.rebind.poll()
                && let Err(e) = self.apply_rebind(rebind)
            {
                tracing::warn!("{e:#}");
            }
            self.session
                .publish_joypad(self.aggregator.snapshot(&self.keyboard));

            let now = Instant::now();
            if let Some(audio) = self.audio.as_mut() {
                audio.drive(now - last);
            }
            last = now;

            if self.presenter.present_latest() {
                self.fps.frame();
            }
            if let Some(fps) = self.fps.tick(now) {
                tracing::debug!(fps, "frame rate");
            }
            self.session.slots(now);

            if deadline.is_some_and(|d| now >= d) {
                break;
            }
            pacer.wait();
        }

        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(path) = self.args.dump_frame.clone() {
            self.presenter.surface().write_png(&path)?;
            tracing::info!(path = %path.display(), "frame written");
        }
        #[cfg(feature = "gamepad")]
        if let Some(poller) = self.poller.as_ref()
            && !poller.is_running()
        {
            tracing::warn!("gamepad thread exited early");
        }
        let clock = self.session.clock();
        tracing::info!(
            transport = ?self.session.state(),
            clock = ?self.session.clock_state(),
            presented = self.presenter.blits(),
            surface_presents = self.presenter.surface().presents(),
            pulls = clock.pulls(),
            silent_pulls = clock.silent_pulls(),
            samples = clock.samples_delivered(),
            "shutting down"
        );
        self.session.shutdown();
        Ok(())
    }

    fn insert(&mut self, path: &Path) {
        match self.session.insert_cartridge(path) {
            Ok(info) => {
                tracing::info!(title = %info.title, "running");
                if let Err(e) = self.store.push_recent(path) {
                    tracing::warn!(error = %e, "could not record recent program");
                }
            }
            Err(e) => {
                tracing::error!(path = %path.display(), "{e}");
                if !path.exists() {
                    match self.store.forget_recent(path) {
                        Ok(true) => tracing::info!(path = %path.display(), "removed from recent"),
                        Ok(false) => {}
                        Err(e) => tracing::warn!(error = %e, "could not update recent programs"),
                    }
                }
            }
        }
    }

    fn send_selected_palette(&self) -> Result<()> {
        if let Some(palette) = self.store.settings().palettes.selected() {
            self.session.send_setting(CoreSetting::CustomPalette {
                target: PaletteTarget::All,
                colors: palette.rgb()?,
            });
        }
        Ok(())
    }

    fn send_volume(&self) {
        let gain = self.store.settings().sound.gain();
        self.session.send_setting(CoreSetting::Volume(gain));
    }

    fn apply_rebind(&mut self, rebind: Rebind) -> Result<()> {
        tracing::info!(?rebind, "binding changed");
        self.aggregator.apply(rebind);
        match rebind {
            Rebind::Key { button, key } => self.store.set_key_binding(button, Some(key))?,
            Rebind::Gamepad { button, input } => {
                self.store.set_gamepad_binding(button, Some(input))?
            }
        }
        Ok(())
    }

    fn handle(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            Command::Insert(path) => self.insert(&path),
            Command::PowerOn => self.session.power_on()?,
            Command::PowerOff => self.session.power_off()?,
            Command::Pause => self.session.pause()?,
            Command::Resume => self.session.resume()?,
            Command::Reset => self.session.reset()?,
            Command::Save(slot) => {
                let path = self.session.save_state(SlotIndex::new(slot)?)?;
                tracing::info!(slot, path = %path.display(), "state saved");
            }
            Command::Load(slot) => match self.session.load_state(SlotIndex::new(slot)?)? {
                LoadOutcome::Loaded => tracing::info!(slot, "state loaded"),
                LoadOutcome::Empty => tracing::info!(slot, "slot is empty"),
            },
            Command::Slots => {
                for info in self.session.slots(Instant::now()) {
                    match info.modified {
                        Some(modified) => println!("{} {:?}", info.slot, modified),
                        None => println!("{} empty", info.slot),
                    }
                }
            }
            Command::Scale(scale) => self.presenter.set_scale(scale)?,
            Command::Rate(rate) => self.session.set_sample_rate(rate)?,
            Command::Speed(multiplier) => self
                .session
                .send_setting(CoreSetting::ClockMultiplier(multiplier)),
            Command::Volume(volume) => {
                self.store.set_volume(volume)?;
                self.send_volume();
            }
            Command::Mute(muted) => {
                self.store.set_muted(muted)?;
                self.send_volume();
            }
            Command::Mono(mono) => {
                self.store.set_mono(mono)?;
                self.session.send_setting(CoreSetting::MonoAudio(mono));
            }
            Command::Channel { channel, enabled } => {
                self.store.set_sound_channel(channel, enabled)?;
                self.session
                    .send_setting(CoreSetting::SoundChannel { channel, enabled });
            }
            Command::Palette(name) => {
                self.store.select_palette(&name)?;
                self.send_selected_palette()?;
            }
            Command::AddPalette { name, colors } => {
                self.store.save_palette(Palette::new(name.as_str(), colors))?;
                tracing::info!(%name, "palette saved");
            }
            Command::DeletePalette(name) => {
                self.store.delete_palette(&name)?;
                let selected = &self.store.settings().palettes.selected;
                tracing::info!(%name, %selected, "palette deleted");
                self.send_selected_palette()?;
            }
            Command::Key { code, down } => {
                if self.rebind.is_open() {
                    if down && let Some(rebind) = self.rebind.on_key(code) {
                        self.apply_rebind(rebind)?;
                    }
                } else if down {
                    self.keyboard.press(code);
                } else {
                    self.keyboard.release(code);
                }
            }
            Command::ReleaseKeys => self.keyboard.clear(),
            Command::BindKey(button) => self.rebind.begin_key(button),
            Command::BindPad(button) => {
                self.rebind
                    .begin_gamepad(button, self.gamepad.clone(), CAPTURE_POLL)?
            }
            Command::CancelBind => self.rebind.close(),
            Command::RestoreControls => {
                let bindings = self.store.restore_default_controls()?.clone();
                self.aggregator.set_bindings(bindings);
                tracing::info!("default controls restored");
            }
            Command::Recent => {
                for path in self.store.settings().recent.iter() {
                    println!("{}", path.display());
                }
            }
            Command::ClearRecent => self.store.clear_recent()?,
            Command::BootRom(path) => {
                self.store.set_boot_rom(path)?;
                tracing::info!("boot ROM setting saved, applies on next start");
            }
            Command::SavesDir(dir) => {
                self.store.set_saves_dir(dir)?;
                tracing::info!("battery save directory saved, applies on next start");
            }
            Command::SaveStatesDir(dir) => {
                self.store.set_save_states_dir(dir.clone())?;
                self.session.set_save_states_dir(dir);
            }
            Command::Fps => println!("{} fps", self.fps.last()),
            Command::Dump(path) => self.presenter.surface().write_png(&path)?,
            Command::Quit => {}
        }
        Ok(())
    }
}

#[cfg(feature = "gamepad")]
fn spawn_gamepad(
    writer: GamepadStateWriter,
    disabled: bool,
) -> Option<gbhost_input::GamepadPoller> {
    use gbhost_input::{GamepadPoller, PollerConfig, gilrs_source::GilrsSource};

    if disabled {
        return None;
    }
    match GamepadPoller::spawn(GilrsSource::open, writer, PollerConfig::default()) {
        Ok(poller) => Some(poller),
        Err(e) => {
            tracing::warn!(error = %e, "gamepad input disabled");
            None
        }
    }
}
