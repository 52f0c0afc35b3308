//! Reads RDF files into a [`QuadStream`].

use crate::QuadStream;
use anyhow::{Context, Result};
use futures::channel::mpsc;
use futures::SinkExt;
use log::{debug, info};
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::Quad;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Quads parsed ahead of the consumer.
const INPUT_BUFFER: usize = 1024;

/// Guesses the serialization of `path` from its extension, defaulting to N-Quads.
pub fn format_for_path(path: &Path) -> RdfFormat {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(RdfFormat::from_extension)
        .unwrap_or(RdfFormat::NQuads)
}

/// Streams the quads of every file in `paths`, one file after the other.
///
/// Parsing happens on a blocking thread of the current tokio runtime. A file
/// that cannot be opened or parsed ends the stream with an error item.
pub fn read_quads(paths: Vec<PathBuf>) -> QuadStream<'static> {
    let (mut tx, rx) = mpsc::channel::<Result<Quad>>(INPUT_BUFFER);
    tokio::task::spawn_blocking(move || {
        for path in paths {
            match parse_file(&path, &mut tx) {
                Ok(true) => {}
                // the consumer went away
                Ok(false) => return,
                Err(e) => {
                    let _ = futures::executor::block_on(tx.send(Err(e)));
                    return;
                }
            }
        }
    });
    Box::pin(rx)
}

/// Sends every quad of `path` to `tx`. Returns false once nobody listens.
fn parse_file(path: &Path, tx: &mut mpsc::Sender<Result<Quad>>) -> Result<bool> {
    let format = format_for_path(path);
    info!("Reading {} as {}", path.display(), format.name());
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let parser = RdfParser::from_format(format).for_reader(BufReader::new(file));
    let mut count = 0usize;
    for quad in parser {
        let quad = quad.with_context(|| format!("Failed to parse {}", path.display()))?;
        if futures::executor::block_on(tx.send(Ok(quad))).is_err() {
            debug!("Input consumer stopped after {} quads", count);
            return Ok(false);
        }
        count += 1;
    }
    debug!("Read {} quads from {}", count, path.display());
    Ok(true)
}
