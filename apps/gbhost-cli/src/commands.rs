//! Line-oriented control channel read from stdin. Stands in for the menu
//! and keyboard events a windowed frontend would deliver.

use std::{
    io::{self, BufRead},
    path::PathBuf,
    thread,
};

use anyhow::{Result, anyhow, bail};
use crossbeam_channel::Sender;
use gbhost_runtime::Button;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Insert(PathBuf),
    PowerOn,
    PowerOff,
    Pause,
    Resume,
    Reset,
    Save(u8),
    Load(u8),
    Slots,
    Scale(u8),
    Rate(u32),
    Speed(f32),
    Volume(u8),
    Mute(bool),
    Mono(bool),
    Channel { channel: u8, enabled: bool },
    Palette(String),
    AddPalette { name: String, colors: String },
    DeletePalette(String),
    Key { code: u32, down: bool },
    /// Focus lost: every held key is released.
    ReleaseKeys,
    BindKey(Button),
    BindPad(Button),
    CancelBind,
    /// Both keyboard and gamepad bindings back to defaults.
    RestoreControls,
    Recent,
    ClearRecent,
    BootRom(Option<PathBuf>),
    SavesDir(PathBuf),
    SaveStatesDir(PathBuf),
    Fps,
    Dump(PathBuf),
    Quit,
}

fn arg<'a>(words: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<&'a str> {
    words.next().ok_or_else(|| anyhow!("missing {what}"))
}

/// Emulation speeds offered to the user.
pub const SPEEDS: [f32; 6] = [0.25, 0.5, 1.0, 2.0, 3.0, 4.0];

/// Everything after the verb, so paths may contain spaces.
fn rest<'a>(line: &'a str, verb: &str, what: &str) -> Result<&'a str> {
    let rest = line.trim_start()[verb.len()..].trim();
    if rest.is_empty() {
        bail!("missing {what}");
    }
    Ok(rest)
}

fn switch(word: &str) -> Result<bool> {
    match word {
        "on" => Ok(true),
        "off" => Ok(false),
        other => bail!("expected on or off, got {other:?}"),
    }
}

fn speed(word: &str) -> Result<f32> {
    let multiplier: f32 = word.parse()?;
    if !SPEEDS.contains(&multiplier) {
        bail!("speed must be one of {SPEEDS:?}, got {word}");
    }
    Ok(multiplier)
}

fn button(name: &str) -> Result<Button> {
    Button::from_name(name).ok_or_else(|| anyhow!("unknown button {name:?}"))
}

pub fn parse(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let cmd = match verb.to_ascii_lowercase().as_str() {
        "insert" | "open" => Command::Insert(PathBuf::from(rest(line, verb, "path")?)),
        "on" | "power-on" => Command::PowerOn,
        "off" | "power-off" => Command::PowerOff,
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "reset" => Command::Reset,
        "save" => Command::Save(arg(&mut words, "slot")?.parse()?),
        "load" => Command::Load(arg(&mut words, "slot")?.parse()?),
        "slots" => Command::Slots,
        "scale" => Command::Scale(arg(&mut words, "scale")?.parse()?),
        "rate" => Command::Rate(arg(&mut words, "sample rate")?.parse()?),
        "speed" => Command::Speed(speed(arg(&mut words, "multiplier")?)?),
        "volume" => Command::Volume(arg(&mut words, "volume")?.parse()?),
        "mute" => Command::Mute(switch(arg(&mut words, "on|off")?)?),
        "mono" => Command::Mono(switch(arg(&mut words, "on|off")?)?),
        "channel" => Command::Channel {
            channel: arg(&mut words, "channel")?.parse()?,
            enabled: switch(arg(&mut words, "on|off")?)?,
        },
        "palette" => Command::Palette(rest(line, verb, "palette name")?.to_string()),
        "palette-add" => {
            let words: Vec<&str> = words.collect();
            if words.len() < 5 {
                bail!("expected a name followed by four rrggbb colours");
            }
            let (name, colors) = words.split_at(words.len() - 4);
            Command::AddPalette {
                name: name.join(" "),
                colors: colors.join(" "),
            }
        }
        "palette-del" => Command::DeletePalette(rest(line, verb, "palette name")?.to_string()),
        "key" => {
            let code = arg(&mut words, "key code")?.parse()?;
            let down = match arg(&mut words, "down|up")? {
                "down" => true,
                "up" => false,
                other => bail!("expected down or up, got {other:?}"),
            };
            Command::Key { code, down }
        }
        "blur" => Command::ReleaseKeys,
        "bind" => Command::BindKey(button(arg(&mut words, "button")?)?),
        "bindpad" => Command::BindPad(button(arg(&mut words, "button")?)?),
        "cancel" => Command::CancelBind,
        "defaults" => Command::RestoreControls,
        "recent" => match words.next() {
            None => Command::Recent,
            Some("clear") => Command::ClearRecent,
            Some(other) => bail!("unknown recent action {other:?}"),
        },
        "bootrom" => match rest(line, verb, "path or none")? {
            "none" => Command::BootRom(None),
            path => Command::BootRom(Some(PathBuf::from(path))),
        },
        "saves-dir" => Command::SavesDir(PathBuf::from(rest(line, verb, "directory")?)),
        "states-dir" => Command::SaveStatesDir(PathBuf::from(rest(line, verb, "directory")?)),
        "fps" => Command::Fps,
        "dump" => Command::Dump(PathBuf::from(arg(&mut words, "path")?)),
        "quit" | "exit" => Command::Quit,
        other => bail!("unknown command {other:?}"),
    };
    Ok(Some(cmd))
}

/// Reads commands from stdin until EOF. Parse errors are reported and
/// skipped.
pub fn spawn_stdin(tx: Sender<Command>) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("gbhost-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                };
                match parse(&line) {
                    Ok(Some(cmd)) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(line = %line, "{e:#}"),
                }
            }
            tracing::debug!("stdin closed");
        })
}
