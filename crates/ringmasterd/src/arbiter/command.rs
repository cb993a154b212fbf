//! Request/reply command surface served to control-plane collaborators.

use camino::Utf8Path;
use ringmaster_config::Manifest;
use serde_json::{Value, json};
use strum::{Display, EnumString, IntoStaticStr};
use tracing::debug;

use super::{ARBITER_TARGET, Arbiter, ArbiterError, ArbiterState, CommandError};
use crate::watcher::{Watcher, WatcherState};

/// Commands accepted by [`Arbiter::handle_command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Command {
    /// `start [watcher]`
    Start,
    /// `stop [watcher]`
    Stop,
    /// `restart [watcher]`
    Restart,
    /// `reload [manifest-path]`
    Reload,
    /// `incr <watcher> [count]`
    Incr,
    /// `decr <watcher> [count]`
    Decr,
    /// `numprocesses [watcher]`
    Numprocesses,
    /// `numwatchers`
    Numwatchers,
    /// `list [watcher]`
    List,
    /// `status [watcher]`
    Status,
    /// `listpids <watcher>`
    Listpids,
    /// `sockets`
    Sockets,
}

struct Args<'a> {
    command: Command,
    values: &'a [String],
}

impl<'a> Args<'a> {
    fn at_most(&self, limit: usize) -> Result<(), CommandError> {
        if self.values.len() > limit {
            return Err(self.invalid(format!(
                "expected at most {limit} argument(s), got {}",
                self.values.len()
            )));
        }
        Ok(())
    }

    fn optional(&self, index: usize) -> Option<&'a str> {
        self.values.get(index).map(String::as_str)
    }

    fn required(&self, index: usize, what: &str) -> Result<&'a str, CommandError> {
        self.optional(index)
            .ok_or_else(|| self.invalid(format!("missing {what}")))
    }

    fn count(&self, index: usize) -> Result<usize, CommandError> {
        match self.optional(index) {
            None => Ok(1),
            Some(value) => value
                .parse()
                .map_err(|_| self.invalid(format!("'{value}' is not a process count"))),
        }
    }

    fn invalid(&self, message: String) -> CommandError {
        CommandError::InvalidArguments {
            command: self.command.to_string(),
            message,
        }
    }
}

fn ok() -> Value {
    json!({ "status": "ok" })
}

fn reply(value: impl serde::Serialize) -> Result<Value, CommandError> {
    serde_json::to_value(value).map_err(|source| CommandError::Reply { source })
}

impl Arbiter {
    /// Serves one control command and returns its JSON reply.
    ///
    /// Commands that name a watcher fail with
    /// [`CommandError::UnknownWatcher`] when it does not exist.
    pub fn handle_command(&mut self, name: &str, args: &[String]) -> Result<Value, CommandError> {
        let command: Command = name.parse().map_err(|_| CommandError::UnknownCommand {
            name: name.to_owned(),
        })?;
        debug!(
            target: ARBITER_TARGET,
            command = %command,
            args = ?args,
            "handling command"
        );
        let args = Args {
            command,
            values: args,
        };
        match command {
            Command::Start => self.command_start(&args),
            Command::Stop => self.command_stop(&args),
            Command::Restart => self.command_restart(&args),
            Command::Reload => self.command_reload(&args),
            Command::Incr | Command::Decr => self.command_scale(&args),
            Command::Numprocesses => {
                args.at_most(1)?;
                let total = match args.optional(0) {
                    Some(name) => self.find(name)?.numprocesses(),
                    None => self.watchers.iter().map(Watcher::numprocesses).sum(),
                };
                Ok(json!({ "numprocesses": total }))
            }
            Command::Numwatchers => {
                args.at_most(0)?;
                Ok(json!({ "numwatchers": self.watchers.len() }))
            }
            Command::List => {
                args.at_most(1)?;
                match args.optional(0) {
                    Some(name) => Ok(json!({ "pids": self.find(name)?.pids() })),
                    None => {
                        let names: Vec<_> = self.watchers.iter().map(Watcher::name).collect();
                        Ok(json!({ "watchers": names }))
                    }
                }
            }
            Command::Listpids => {
                args.at_most(1)?;
                let name = args.required(0, "watcher name")?;
                Ok(json!({ "pids": self.find(name)?.pids() }))
            }
            Command::Status => {
                args.at_most(1)?;
                match args.optional(0) {
                    Some(name) => reply(self.find(name)?.status()),
                    None => reply(self.status()),
                }
            }
            Command::Sockets => {
                args.at_most(0)?;
                Ok(json!({ "sockets": reply(self.sockets.infos())? }))
            }
        }
    }

    fn command_start(&mut self, args: &Args<'_>) -> Result<Value, CommandError> {
        args.at_most(1)?;
        match args.optional(0) {
            None if self.state == ArbiterState::Stopped => self.start()?,
            None => {
                for watcher in &mut self.watchers {
                    watcher.start(&self.sockets)?;
                }
            }
            Some(name) => {
                self.require_running()?;
                let sockets = &self.sockets;
                let watcher = find_mut(&mut self.watchers, name)?;
                watcher.start(sockets)?;
            }
        }
        Ok(ok())
    }

    fn command_stop(&mut self, args: &Args<'_>) -> Result<Value, CommandError> {
        args.at_most(1)?;
        match args.optional(0) {
            None => self.stop()?,
            Some(name) => self.find_mut(name)?.stop(),
        }
        Ok(ok())
    }

    fn command_restart(&mut self, args: &Args<'_>) -> Result<Value, CommandError> {
        args.at_most(1)?;
        self.require_running()?;
        match args.optional(0) {
            None => {
                for watcher in &mut self.watchers {
                    if watcher.state() != WatcherState::Stopped {
                        watcher.restart(&self.sockets)?;
                    }
                }
            }
            Some(name) => {
                let sockets = &self.sockets;
                find_mut(&mut self.watchers, name)?.restart(sockets)?;
            }
        }
        Ok(ok())
    }

    fn command_reload(&mut self, args: &Args<'_>) -> Result<Value, CommandError> {
        args.at_most(1)?;
        let manifest = match args.optional(0) {
            Some(path) => Manifest::load(Utf8Path::new(path))?,
            None => self.manifest.clone(),
        };
        let summary = self.reload(manifest)?;
        reply(summary)
    }

    fn command_scale(&mut self, args: &Args<'_>) -> Result<Value, CommandError> {
        args.at_most(2)?;
        let name = args.required(0, "watcher name")?;
        let by = args.count(1)?;
        let watcher = self.find_mut(name)?;
        let numprocesses = if args.command == Command::Incr {
            watcher.incr(by)
        } else {
            watcher.decr(by)
        };
        Ok(json!({ "numprocesses": numprocesses }))
    }

    fn require_running(&self) -> Result<(), CommandError> {
        if self.state == ArbiterState::Running {
            Ok(())
        } else {
            Err(ArbiterError::NotRunning.into())
        }
    }

    fn find(&self, name: &str) -> Result<&Watcher, CommandError> {
        self.watcher(name)
            .ok_or_else(|| CommandError::UnknownWatcher {
                name: name.to_owned(),
            })
    }

    fn find_mut(&mut self, name: &str) -> Result<&mut Watcher, CommandError> {
        find_mut(&mut self.watchers, name)
    }
}

fn find_mut<'a>(watchers: &'a mut [Watcher], name: &str) -> Result<&'a mut Watcher, CommandError> {
    watchers
        .iter_mut()
        .find(|watcher| watcher.name() == name)
        .ok_or_else(|| CommandError::UnknownWatcher {
            name: name.to_owned(),
        })
}
