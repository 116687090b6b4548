use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};

/// What to do after a page in batch mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchDecision {
    Continue,
    Stop,
}

/// Asks the user whether to scan another page.
#[async_trait]
pub trait BatchPrompt: Send {
    async fn next_page(&mut self) -> BatchDecision;
}

/// Reads the answer as one line of text.
///
/// A line starting with `s` or `S` stops; end of input also stops; anything
/// else (including an empty line) continues.
pub struct LinePrompt<R> {
    reader: R,
}
impl<R> LinePrompt<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}
impl LinePrompt<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

fn decide(line: &str) -> BatchDecision {
    match line.trim_start().starts_with(['s', 'S']) {
        true => BatchDecision::Stop,
        false => BatchDecision::Continue,
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> BatchPrompt for LinePrompt<R> {
    async fn next_page(&mut self) -> BatchDecision {
        tracing::info!("Press RETURN to scan the next page or S to stop");
        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) => BatchDecision::Stop,
            Ok(_) => decide(&line),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read answer; stopping");
                BatchDecision::Stop
            },
        }
    }
}
