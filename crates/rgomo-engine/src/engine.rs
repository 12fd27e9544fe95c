//! エンジンプロセスの管理
//!
//! 子プロセス 1 つと、その stdin への書き込み口、stdout を読む [`StreamDemux`] を所有する。
//! stdin に書くのは [`EngineProcess::send`]、stdout を読むのは demux のスレッドだけ。

use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::demux::StreamDemux;
use crate::error::{EngineError, Result};
use crate::protocol::{Protocol, ProtocolFactory, SessionState, Stone, Transport, format_command};
use crate::types::{Move, PlayResult};

pub const ENGINE_QUIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// 毒化した Mutex でも中身を使い続ける（書き込み途中のパニックで後続を止めない）
fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 子プロセスへの送受信口。プロトコルからは [`Transport`] として見える。
struct ProcessIo {
    child: Mutex<Child>,
    /// 閉じた後は None
    stdin: Mutex<Option<BufWriter<ChildStdin>>>,
    demux: StreamDemux,
    pid: u32,
}

impl ProcessIo {
    fn is_running(&self) -> bool {
        matches!(lock_or_recover(&self.child).try_wait(), Ok(None))
    }

    /// `timeout` の間、終了をポーリングで待つ。終了していれば true。
    fn wait_exit(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_running() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(ENGINE_QUIT_POLL_INTERVAL);
        }
    }

    /// stdin を閉じる。EOF で終了するエンジンはこれで抜ける。
    fn close_stdin(&self) {
        if let Some(mut stdin) = lock_or_recover(&self.stdin).take() {
            if let Err(e) = stdin.flush() {
                debug!("engine[{}]: flush before close failed: {e}", self.pid);
            }
        }
    }

    fn kill(&self) {
        if let Err(e) = lock_or_recover(&self.child).kill() {
            debug!("engine[{}]: kill failed: {e}", self.pid);
        }
    }
}

impl Transport for ProcessIo {
    fn send(&self, parts: &[&str]) -> Result<()> {
        if !self.is_running() {
            return Err(EngineError::EngineTerminated);
        }
        let line = format_command(parts);
        debug!("engine[{}] < {line}", self.pid);
        let mut guard = lock_or_recover(&self.stdin);
        let Some(stdin) = guard.as_mut() else {
            return Err(EngineError::EngineTerminated);
        };
        let written = writeln!(stdin, "{line}").and_then(|()| stdin.flush());
        match written {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Err(EngineError::EngineTerminated),
            Err(e) => Err(e.into()),
        }
    }

    fn receive(&self, category: &str, reset: bool, timeout: Duration) -> Result<Option<String>> {
        let line = self.demux.read(category, timeout, reset)?;
        if let Some(ref l) = line {
            debug!("engine[{}] > [{category}] {l}", self.pid);
        }
        Ok(line)
    }
}

/// 1 本のエンジンプロセス
pub struct EngineProcess {
    io: Arc<ProcessIo>,
    protocol: Box<dyn Protocol>,
    dialect: String,
    quit_grace: Duration,
    kill_wait: Duration,
    terminated: bool,
}

impl EngineProcess {
    /// 既定設定でエンジンを起動する。
    pub fn start(path: impl AsRef<Path>, dialect: &str) -> Result<Self> {
        let mut config = EngineConfig::new(path.as_ref());
        config.dialect = dialect.to_string();
        Self::start_with(&config, &ProtocolFactory::default())
    }

    /// 設定とダイアレクト表を指定して起動する。
    ///
    /// ダイアレクトは起動前に解決するため、未知の名前ではプロセスを作らない。
    pub fn start_with(config: &EngineConfig, factory: &ProtocolFactory) -> Result<Self> {
        let dialect = factory.dialect(&config.dialect)?;
        let categories = dialect.categories()?;

        let mut cmd = Command::new(&config.path);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(config.stderr.to_stdio());
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }
        let mut child = cmd
            .spawn()
            .map_err(|source| EngineError::EngineNotFound { path: config.path.clone(), source })?;
        let pid = child.id();

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(io::Error::other("engine stdio was not captured").into());
            }
        };
        let demux = match StreamDemux::spawn(stdout, categories) {
            Ok(demux) => demux,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        let io = Arc::new(ProcessIo {
            child: Mutex::new(child),
            stdin: Mutex::new(Some(BufWriter::new(stdin))),
            demux,
            pid,
        });
        let mut protocol = dialect.create(Arc::clone(&io) as Arc<dyn Transport>);
        if let Some(window) = config.telemetry_window() {
            protocol.set_telemetry_window(window);
        }
        info!("engine[{pid}]: started {} ({})", config.path.display(), dialect.name());

        Ok(Self {
            io,
            protocol,
            dialect: dialect.name().to_string(),
            quit_grace: config.quit_grace(),
            kill_wait: config.kill_wait(),
            terminated: false,
        })
    }

    /// 起動設定に従って準備確認とオプション送信を行う。準備完了でなければ false。
    pub fn handshake(&mut self, config: &EngineConfig) -> Result<bool> {
        if !self.is_ready(config.board_size, config.ready_timeout())? {
            return Ok(false);
        }
        self.configure(&config.info_options())?;
        Ok(true)
    }

    pub fn pid(&self) -> u32 {
        self.io.pid
    }

    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    /// プロセスが生きているか。応答が遅いのか死んでいるのかはこれで区別する。
    pub fn is_running(&self) -> bool {
        self.io.is_running()
    }

    pub fn protocol(&mut self) -> &mut dyn Protocol {
        self.protocol.as_mut()
    }

    pub fn state(&self) -> SessionState {
        self.protocol.state()
    }

    /// 生のコマンド送信
    pub fn send(&self, parts: &[&str]) -> Result<()> {
        self.io.send(parts)
    }

    /// 生のカテゴリ受信
    pub fn receive(&self, category: &str, reset: bool, timeout: Duration) -> Result<Option<String>> {
        self.io.receive(category, reset, timeout)
    }

    pub fn is_ready(&mut self, board_size: u32, timeout: Duration) -> Result<bool> {
        self.protocol.is_ready(board_size, timeout)
    }

    pub fn play(&mut self, last_move: Move, time_left_ms: u64) -> Result<PlayResult> {
        self.protocol.play(last_move, time_left_ms)
    }

    pub fn begin(&mut self, time_left_ms: u64) -> Result<PlayResult> {
        self.protocol.begin(time_left_ms)
    }

    pub fn load_board(&mut self, stones: &[Stone], time_left_ms: u64) -> Result<PlayResult> {
        self.protocol.load_board(stones, time_left_ms)
    }

    pub fn send_move(&mut self, mv: Move) -> Result<()> {
        self.protocol.send_move(mv)
    }

    /// ダイアレクト経由の生コマンド。`quit` 後は `EngineTerminated`。
    pub fn send_command(&mut self, parts: &[&str]) -> Result<()> {
        self.protocol.send_command(parts)
    }

    pub fn configure(&mut self, options: &[(String, String)]) -> Result<()> {
        self.protocol.configure(options)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.protocol.stop()
    }

    /// 読み込みスレッドが終了したか
    pub fn is_reader_finished(&self) -> bool {
        self.io.demux.is_finished()
    }

    /// 終了コマンド → stdin を閉じる → 猶予待ち → 強制終了 → 最終待ち → 読み込みスレッドの回収。
    /// 2 回目以降は何もしない。
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        let pid = self.io.pid;

        if let Err(e) = self.protocol.quit() {
            debug!("engine[{pid}]: quit not delivered: {e}");
        }
        self.io.close_stdin();
        if !self.io.wait_exit(self.quit_grace) {
            warn!("engine[{pid}]: still running {}ms after quit, killing", self.quit_grace.as_millis());
            self.io.kill();
            if !self.io.wait_exit(self.kill_wait) {
                warn!("engine[{pid}]: did not exit after kill");
            }
        }
        self.io.demux.stop();
        // プロセスが終われば stdout が閉じ、読み込みスレッドも抜ける
        if !self.io.demux.join(self.kill_wait) {
            warn!("engine[{pid}]: output reader still blocked, detaching it");
        }
        info!("engine[{pid}]: terminated");
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}
