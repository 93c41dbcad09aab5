//! Engine driver: speaks UCI to one child process.
//!
//! All I/O here is blocking and strictly sequential — a command is never
//! sent until the previous command's terminal line has been consumed. This
//! mirrors how the protocol is actually used: engines are not expected to
//! interleave responses to two outstanding requests.

use std::collections::{BTreeMap, HashSet};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Mutex;

use fishnet_core::{Clock, EngineInfo};
use log::{debug, warn};

use crate::error::DeadEngine;
use crate::info_parser::apply_info_line;
use fishnet_core::InfoRecord;

/// Some platform libc/runtime combinations race when two threads `fork()`
/// concurrently; every engine spawn goes through this lock to avoid it.
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

/// Search parameters passed to [`EngineDriver::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchBudget {
    pub movetime_ms: Option<u64>,
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    pub clock: Option<Clock>,
}

pub struct EngineDriver {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<std::process::ChildStdout>,
}

impl EngineDriver {
    /// Spawn the engine command in its own process group so signals sent to
    /// this process don't reach it. `cwd` mirrors the source's `EngineDir`
    /// setting (engine-binary discovery/download itself is out of scope).
    pub fn spawn(command: &[String], cwd: Option<&Path>) -> std::io::Result<Self> {
        let (program, args) = command
            .split_first()
            .expect("engine_command must have at least one element");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        new_process_group(&mut cmd);

        let mut child = {
            let _guard = SPAWN_LOCK.lock().unwrap();
            cmd.spawn()?
        };
        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = BufReader::new(child.stdout.take().expect("piped stdout"));

        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }

    /// Force-terminate the whole process group.
    pub fn kill(&mut self) {
        kill_process_group(&mut self.child);
    }

    /// OS process id of the engine child, so another thread can kill it (via
    /// [`kill_pid`]) to unblock a read this driver is currently blocked in.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    fn send_line(&mut self, line: &str) -> Result<(), DeadEngine> {
        debug!(target: "fishnet::uci", "> {line}");
        writeln!(self.stdin, "{line}").map_err(DeadEngine::Io)?;
        self.stdin.flush().map_err(DeadEngine::Io)?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, DeadEngine> {
        loop {
            let mut buf = String::new();
            let n = self.stdout.read_line(&mut buf).map_err(DeadEngine::Io)?;
            if n == 0 {
                return Err(DeadEngine::Eof);
            }
            let line = buf.trim_end_matches(['\r', '\n']).to_string();
            if line.is_empty() {
                continue;
            }
            debug!(target: "fishnet::uci", "< {line}");
            return Ok(line);
        }
    }

    /// `uci` → read until `uciok`, collecting `id` and `option` lines.
    pub fn handshake(&mut self) -> Result<(EngineInfo, HashSet<String>), DeadEngine> {
        self.send_line("uci")?;

        let mut fields = BTreeMap::new();
        let mut options = HashSet::new();

        loop {
            let line = self.read_line()?;
            if line == "uciok" {
                break;
            }
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("id") => {
                    if let Some(key) = tokens.next() {
                        let value = tokens.collect::<Vec<_>>().join(" ");
                        fields.insert(key.to_string(), value);
                    }
                }
                Some("option") => {
                    if let Some(name) = parse_option_name(&line) {
                        options.insert(name);
                    }
                }
                _ => warn!(target: "fishnet::uci", "unrecognized line during handshake: {line:?}"),
            }
        }

        Ok((
            EngineInfo {
                fields,
                options: BTreeMap::new(),
            },
            options,
        ))
    }

    /// `isready` → read until `readyok`.
    pub fn sync(&mut self) -> Result<(), DeadEngine> {
        self.send_line("isready")?;
        loop {
            let line = self.read_line()?;
            if line == "readyok" {
                return Ok(());
            }
            if line.starts_with("info string") {
                continue;
            }
            warn!(target: "fishnet::uci", "unexpected line while waiting for readyok: {line:?}");
        }
    }

    pub fn ucinewgame(&mut self) -> Result<(), DeadEngine> {
        self.send_line("ucinewgame")
    }

    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), DeadEngine> {
        self.send_line(&format!("setoption name {name} value {value}"))
    }

    pub fn set_option_bool(&mut self, name: &str, value: bool) -> Result<(), DeadEngine> {
        self.set_option(name, if value { "true" } else { "false" })
    }

    /// Derived helper: sets `UCI_Chess960` and `UCI_Variant` from a variant name.
    pub fn set_variant(&mut self, variant: &str) -> Result<(), DeadEngine> {
        let chess960 = matches!(variant, "fromposition" | "chess960");
        self.set_option_bool("UCI_Chess960", chess960)?;

        let uci_variant = match variant {
            "standard" | "fromposition" | "chess960" => "chess",
            "antichess" => "giveaway",
            other => other,
        };
        self.set_option("UCI_Variant", uci_variant)
    }

    /// `position ...` then `go ...`, accumulating `info` lines until `bestmove`.
    pub fn search(
        &mut self,
        position: &str,
        moves: &[&str],
        budget: &SearchBudget,
    ) -> Result<InfoRecord, DeadEngine> {
        let mut position_cmd = format!("position fen {position}");
        if !moves.is_empty() {
            position_cmd.push_str(" moves ");
            position_cmd.push_str(&moves.join(" "));
        }
        self.send_line(&position_cmd)?;
        self.sync()?;

        self.send_line(&go_line(budget))?;

        let mut record = InfoRecord::new();
        loop {
            let line = self.read_line()?;
            if let Some(rest) = line.strip_prefix("bestmove") {
                let bestmove = rest.trim().split_whitespace().next().unwrap_or("(none)");
                record.bestmove = if bestmove == "(none)" {
                    None
                } else {
                    Some(bestmove.to_string())
                };
                break;
            }
            if let Some(rest) = line.strip_prefix("info ") {
                apply_info_line(&mut record, rest);
            } else if line != "info" {
                warn!(target: "fishnet::uci", "unrecognized line during search: {line:?}");
            }
        }

        self.sync()?;
        Ok(record)
    }
}

fn go_line(budget: &SearchBudget) -> String {
    let mut parts = vec!["go".to_string()];
    if let Some(ms) = budget.movetime_ms {
        parts.push(format!("movetime {ms}"));
    }
    if let Some(depth) = budget.depth {
        parts.push(format!("depth {depth}"));
    }
    if let Some(nodes) = budget.nodes {
        parts.push(format!("nodes {nodes}"));
    }
    if let Some(clock) = &budget.clock {
        parts.push(format!(
            "wtime {} btime {} winc {} binc {}",
            clock.wtime * 10,
            clock.btime * 10,
            clock.inc * 1000,
            clock.inc * 1000,
        ));
    }
    parts.join(" ")
}

fn parse_option_name(line: &str) -> Option<String> {
    let rest = line.strip_prefix("option ")?;
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let name_idx = tokens.iter().position(|&t| t == "name")? + 1;
    let type_idx = tokens.iter().position(|&t| t == "type")?;
    if name_idx >= type_idx {
        return None;
    }
    Some(tokens[name_idx..type_idx].join(" "))
}

#[cfg(unix)]
fn new_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(windows)]
fn new_process_group(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn new_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    kill_pid(child.id());
    let _ = child.wait();
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Force-terminate the process group led by `pid`. Safe to call from a
/// thread other than the one that owns the [`Child`]: this is how an
/// external `stop()` unblocks a worker thread parked in a blocking read on
/// the engine's stdout (the read returns EOF once the process is gone).
#[cfg(unix)]
pub(crate) fn kill_pid(pid: u32) {
    unsafe {
        libc::kill(-(pid as i32), libc::SIGKILL);
    }
}

#[cfg(not(unix))]
pub(crate) fn kill_pid(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_line_orders_movetime_depth_nodes_clock() {
        let budget = SearchBudget {
            movetime_ms: Some(200),
            depth: Some(3),
            nodes: None,
            clock: Some(Clock {
                wtime: 6000,
                btime: 6000,
                inc: 0,
            }),
        };
        assert_eq!(
            go_line(&budget),
            "go movetime 200 depth 3 wtime 60000 btime 60000 winc 0 binc 0"
        );
    }

    #[test]
    fn go_line_with_only_nodes_and_movetime() {
        let budget = SearchBudget {
            movetime_ms: Some(4000),
            depth: None,
            nodes: Some(3_500_000),
            clock: None,
        };
        assert_eq!(go_line(&budget), "go movetime 4000 nodes 3500000");
    }

    #[test]
    fn option_name_can_contain_spaces() {
        let line = "option name Skill Level type spin default 20 min 0 max 20";
        assert_eq!(parse_option_name(line).as_deref(), Some("Skill Level"));
    }

    /// A minimal `sh`-scripted stand-in for a UCI engine, good enough to
    /// exercise handshake/sync/search against a real child process without
    /// depending on an actual chess engine being installed.
    #[cfg(unix)]
    fn fake_engine() -> Vec<String> {
        let script = r#"
echo "id name FakeFish 1.0"
echo "id author Nobody"
echo "option name Hash type spin default 16 min 1 max 1024"
echo "option name UCI_Chess960 type check default false"
echo "uciok"
while IFS= read -r line; do
  case "$line" in
    isready) echo "readyok" ;;
    position*) : ;;
    go*)
      echo "info depth 1 score cp 10 nodes 100 nps 1000 pv e2e4"
      echo "bestmove e2e4"
      ;;
    setoption*) : ;;
    ucinewgame) : ;;
    quit) exit 0 ;;
  esac
done
"#;
        vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[cfg(unix)]
    #[test]
    fn handshake_sync_and_search_against_a_fake_engine() {
        let mut driver = EngineDriver::spawn(&fake_engine(), None).expect("spawn fake engine");

        let (info, options) = driver.handshake().expect("handshake");
        assert_eq!(info.fields.get("name").map(String::as_str), Some("FakeFish 1.0"));
        assert!(options.contains("Hash"));
        assert!(options.contains("UCI_Chess960"));

        driver.sync().expect("sync");

        let budget = SearchBudget {
            movetime_ms: Some(100),
            depth: None,
            nodes: None,
            clock: None,
        };
        let record = driver
            .search("startpos", &[], &budget)
            .expect("search");

        assert_eq!(record.bestmove.as_deref(), Some("e2e4"));
        assert_eq!(record.depth, Some(1));
        assert_eq!(record.nodes, Some(100));
        assert_eq!(record.pv.as_deref(), Some("e2e4"));

        driver.kill();
    }
}
