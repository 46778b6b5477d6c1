//! Live output rendering for streamed fragments.
//!
//! The accumulator publishes fragments on a channel; [`drain`] consumes that
//! channel and feeds a [`Renderer`]. The orchestrator spawns the drain as its
//! display worker and awaits its handle after the turn completes, so the main
//! flow never runs ahead of what the user has seen.

use std::io::{self, Write};

use tokio::sync::mpsc::UnboundedReceiver;

use crate::accumulator::Fragment;

/// Destination for streamed output.
pub trait Renderer {
    /// Render one fragment as it arrives.
    fn render_fragment(&mut self, text: &str);

    /// Called once, after the fragment channel closes.
    fn render_done(&mut self);
}

/// Renders fragments directly to stdout with an immediate flush per
/// fragment, so the response appears as it streams.
pub struct StdoutRenderer {
    wrote_any: bool,
    ends_with_newline: bool,
}

impl StdoutRenderer {
    pub fn new() -> Self {
        Self {
            wrote_any: false,
            ends_with_newline: false,
        }
    }
}

impl Renderer for StdoutRenderer {
    fn render_fragment(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        print!("{}", text);
        io::stdout().flush().ok();
        self.wrote_any = true;
        self.ends_with_newline = text.ends_with('\n');
    }

    fn render_done(&mut self) {
        // Leave the cursor on a fresh line whatever the model ended with.
        if self.wrote_any && !self.ends_with_newline {
            println!();
        }
    }
}

/// Consume the fragment channel until the sender side closes, then signal
/// completion on the renderer exactly once.
pub async fn drain<R: Renderer>(mut rx: UnboundedReceiver<Fragment>, renderer: &mut R) {
    while let Some(fragment) = rx.recv().await {
        renderer.render_fragment(&fragment.text);
    }
    renderer.render_done();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct TestRenderer {
        fragments: Vec<String>,
        done_calls: usize,
    }

    impl Renderer for TestRenderer {
        fn render_fragment(&mut self, text: &str) {
            self.fragments.push(text.to_string());
        }

        fn render_done(&mut self) {
            self.done_calls += 1;
        }
    }

    #[tokio::test]
    async fn drains_in_order_and_signals_done_once() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Fragment { text: "a".to_string() }).unwrap();
        tx.send(Fragment { text: "b".to_string() }).unwrap();
        drop(tx);

        let mut renderer = TestRenderer::default();
        drain(rx, &mut renderer).await;

        assert_eq!(renderer.fragments, vec!["a", "b"]);
        assert_eq!(renderer.done_calls, 1);
    }
}
