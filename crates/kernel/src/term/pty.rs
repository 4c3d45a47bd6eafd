//! Pseudo-terminal master/slave pair: two pipes running in opposite
//! directions, wired the same way as the process subsystem's pipe pairs.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::IpcError;
use crate::process::ipc::pipe::Pipe;
use crate::term::ansi::AnsiParser;
use crate::term::terminal::Terminal;

/// The slave side: what a process attached to the terminal reads and writes.
pub struct PtySlave {
    /// Bytes the process writes land here, to be applied to the terminal.
    input: Pipe,
    /// Bytes the terminal produces for the process to read.
    output: Pipe,
}

impl PtySlave {
    pub async fn write(&self, bytes: &[u8]) -> Result<usize, IpcError> {
        self.input.write(bytes).await
    }

    pub async fn read(&self, max: usize) -> Result<Vec<u8>, IpcError> {
        self.output.read(max).await
    }
}

/// The master side: owns the [`Terminal`] and the ANSI parser, and drives
/// bytes from the slave's input pipe through the parser into the screen.
pub struct PtyMaster {
    terminal: Mutex<Terminal>,
    parser: Mutex<AnsiParser>,
    input: Pipe,
    output: Pipe,
    closed: std::sync::atomic::AtomicBool,
}

impl PtyMaster {
    pub fn pair(cols: usize, rows: usize, scrollback_bound: usize, pipe_capacity: usize) -> (Arc<PtyMaster>, PtySlave) {
        let input = Pipe::new(pipe_capacity);
        let output = Pipe::new(pipe_capacity);
        let master = Arc::new(PtyMaster {
            terminal: Mutex::new(Terminal::new(cols, rows, scrollback_bound)),
            parser: Mutex::new(AnsiParser::new()),
            input: input.clone(),
            output: output.clone(),
            closed: std::sync::atomic::AtomicBool::new(false),
        });
        let slave = PtySlave { input, output };
        (master, slave)
    }

    /// Drain whatever the slave has written and feed it through the parser.
    /// Returns the number of bytes processed, or 0 once the input pipe has
    /// been closed.
    pub async fn pump(&self) -> usize {
        let bytes = match self.input.read(1 << 16).await {
            Ok(b) => b,
            Err(IpcError::PipeClosed) => return 0,
            Err(_) => return 0,
        };
        if bytes.is_empty() {
            return 0;
        }
        let mut term = self.terminal.lock().await;
        let mut parser = self.parser.lock().await;
        parser.feed(&mut term, &bytes);
        let out = term.drain_output(1 << 16);
        drop(term);
        drop(parser);
        if !out.is_empty() {
            let _ = self.output.write(&out).await;
        }
        bytes.len()
    }

    pub async fn resize(&self, cols: usize, rows: usize) {
        self.terminal.lock().await.resize(cols, rows);
    }

    pub async fn with_terminal<R>(&self, f: impl FnOnce(&Terminal) -> R) -> R {
        f(&*self.terminal.lock().await)
    }

    pub async fn close(&self) {
        if self
            .closed
            .swap(true, std::sync::atomic::Ordering::SeqCst)
        {
            return;
        }
        self.input.close().await;
        self.output.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::SeqCst)
    }
}
