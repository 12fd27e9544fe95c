//! エンジン出力のカテゴリ別振り分け
//!
//! 1 本の行ストリーム（エンジンの stdout）をバックグラウンドスレッドで読み、
//! 登録順に述語を試して最初に一致したカテゴリのキューへ積む。
//! 呼び出し側はカテゴリごとに独立したタイムアウト付きで取り出せる。
//!
//! ストリームの終端・読み込みエラーは呼び出し側へ伝播しない。
//! キューが空のまま返り続けるだけなので、エンジンの生死は別途確認すること。

use std::io::{BufRead, BufReader, Read};
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, trace};

use crate::error::{EngineError, Result};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// 正規化済み（trim + 小文字化）の行に対する分類述語
pub type LinePredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

struct Category {
    name: String,
    predicate: LinePredicate,
}

/// カテゴリ定義の一覧。登録順が分類の優先順になる。
#[derive(Default)]
pub struct CategoryTable {
    categories: Vec<Category>,
}

impl CategoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// カテゴリを追加する。同名が既にあれば `DuplicateCategory`。
    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F) -> Result<()>
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        if self.categories.iter().any(|c| c.name == name) {
            return Err(EngineError::DuplicateCategory(name));
        }
        self.categories.push(Category { name, predicate: Box::new(predicate) });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// 最初に一致したカテゴリの添字
    fn classify(&self, line: &str) -> Option<usize> {
        self.categories.iter().position(|c| (c.predicate)(line))
    }
}

/// 行ストリームの振り分け器
///
/// 読み込みスレッドはエンジン 1 つにつき 1 本だけ。キューへの書き込みはそのスレッドのみ、
/// 取り出しは呼び出し側のみが行う。
pub struct StreamDemux {
    queues: Vec<(String, Receiver<String>)>,
    stop: Arc<AtomicBool>,
    /// `join` 済みなら None
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl StreamDemux {
    /// 読み込みスレッドを起動する。以後カテゴリは変更できない。
    pub fn spawn<R>(stream: R, table: CategoryTable) -> Result<StreamDemux>
    where
        R: Read + Send + 'static,
    {
        let mut queues = Vec::with_capacity(table.len());
        let mut senders = Vec::with_capacity(table.len());
        for category in &table.categories {
            let (tx, rx) = unbounded::<String>();
            queues.push((category.name.clone(), rx));
            senders.push(tx);
        }
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("rgomo-demux".to_string())
            .spawn(move || pump_lines(stream, &table, &senders, &stop_flag))?;
        Ok(StreamDemux { queues, stop, handle: Mutex::new(Some(handle)) })
    }

    /// 次の 1 行を最大 `timeout` だけ待って取り出す。
    ///
    /// `drain_to_latest` が真なら、待つ前に最新の 1 件を残して古い行を捨てる
    /// （最新のテレメトリだけが意味を持つ場合に使う）。
    /// タイムアウト・ストリーム終端では `Ok(None)`。未登録のカテゴリは `UnknownCategory`。
    pub fn read(
        &self,
        name: &str,
        timeout: Duration,
        drain_to_latest: bool,
    ) -> Result<Option<String>> {
        let rx = self.queue(name)?;
        if drain_to_latest {
            while rx.len() > 1 {
                if rx.try_recv().is_err() {
                    break;
                }
            }
        }
        Ok(rx.recv_timeout(timeout).ok())
    }

    /// 現在の読み込みが終わり次第スレッドを終了させる。
    ///
    /// ブロック中の読み込みは解除しない。解除はストリームの所有者が閉じて行う。
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// 読み込みスレッドが終了したか
    pub fn is_finished(&self) -> bool {
        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// 読み込みスレッドの終了を最大 `timeout` 待ち、終了していれば join する。
    ///
    /// 終了しなかった場合はスレッドを切り離したまま false を返す。
    pub fn join(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(JOIN_POLL_INTERVAL);
        }
        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                debug!("demux: reader thread panicked");
            }
        }
        true
    }

    /// 登録済みカテゴリ名（登録順）
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.queues.iter().map(|(name, _)| name.as_str())
    }

    fn queue(&self, name: &str) -> Result<&Receiver<String>> {
        self.queues.iter().find(|(n, _)| n == name).map(|(_, rx)| rx).ok_or_else(|| {
            EngineError::UnknownCategory {
                name: name.to_string(),
                valid: self.categories().collect::<Vec<_>>().join(", "),
            }
        })
    }
}

impl Drop for StreamDemux {
    fn drop(&mut self) {
        self.stop();
    }
}

fn pump_lines<R: Read>(
    stream: R,
    table: &CategoryTable,
    senders: &[Sender<String>],
    stop: &AtomicBool,
) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                debug!("demux: end of stream");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!("demux: read error, treating as end of stream: {e}");
                break;
            }
        }
        if stop.load(Ordering::Relaxed) {
            debug!("demux: stop requested");
            break;
        }

        let line = String::from_utf8_lossy(&buf).trim().to_lowercase();
        if line.is_empty() {
            continue;
        }
        match table.classify(&line) {
            Some(idx) => {
                trace!("demux: [{}] {line}", table.categories[idx].name);
                if senders[idx].send(line).is_err() {
                    // 受信側（StreamDemux）が破棄済み
                    break;
                }
            }
            None => trace!("demux: dropped {line:?}"),
        }
    }
}
