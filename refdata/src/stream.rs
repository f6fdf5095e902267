//! Incremental reader for documents of the form `{"items": [ ... ]}`.
//!
//! The envelope is consumed structurally, then elements are decoded one at a
//! time so memory use does not depend on the size of the feed. Decoding is
//! blocking work; [`RecordStream`] runs it on the blocking pool and hands
//! records to the async loader through a bounded channel.

use crate::errors::StreamError;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use tokio::sync::mpsc;

const ITEMS_KEY: &str = "items";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    InArray { first: bool },
    Done,
}

pub struct ItemsReader<R> {
    reader: R,
    state: State,
    ordinal: usize,
}

impl<R: BufRead> ItemsReader<R> {
    pub fn new(reader: R) -> Self {
        ItemsReader {
            reader,
            state: State::Start,
            ordinal: 0,
        }
    }

    /// 1-based position of the most recently decoded element.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Returns the next element, or `None` once the closing `]}` has been consumed.
    pub fn next_record<T: DeserializeOwned>(&mut self) -> Result<Option<T>, StreamError> {
        let first = match self.state {
            State::Done => return Ok(None),
            State::Start => {
                self.open()?;
                true
            }
            State::InArray { first } => first,
        };

        self.skip_whitespace()?;
        match self.peek()? {
            Some(b']') => {
                self.reader.consume(1);
                self.close()?;
                self.state = State::Done;
                return Ok(None);
            }
            Some(b',') if !first => {
                self.reader.consume(1);
            }
            Some(_) if first => {}
            Some(other) => {
                return Err(StreamError::Malformed {
                    expected: "',' or ']'",
                    found: describe(other),
                });
            }
            None => return Err(unexpected_end("']'")),
        }

        self.ordinal += 1;
        let mut deserializer = serde_json::Deserializer::from_reader(&mut self.reader);
        let record = T::deserialize(&mut deserializer).map_err(|source| StreamError::Record {
            ordinal: self.ordinal,
            source,
        })?;
        self.state = State::InArray { first: false };
        Ok(Some(record))
    }

    fn open(&mut self) -> Result<(), StreamError> {
        self.expect(b'{', "'{'")?;
        self.skip_whitespace()?;
        if self.peek()? != Some(b'"') {
            return Err(StreamError::Malformed {
                expected: "\"items\" member",
                found: self.peek()?.map_or_else(|| "end of input".into(), describe),
            });
        }
        let mut deserializer = serde_json::Deserializer::from_reader(&mut self.reader);
        let key = String::deserialize(&mut deserializer).map_err(|e| StreamError::Malformed {
            expected: "member name",
            found: e.to_string(),
        })?;
        if key != ITEMS_KEY {
            return Err(StreamError::Malformed {
                expected: "\"items\" member",
                found: format!("{key:?}"),
            });
        }
        self.expect(b':', "':'")?;
        self.expect(b'[', "'['")?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StreamError> {
        self.expect(b'}', "'}'")
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), StreamError> {
        self.skip_whitespace()?;
        match self.peek()? {
            Some(found) if found == byte => {
                self.reader.consume(1);
                Ok(())
            }
            Some(found) => Err(StreamError::Malformed {
                expected,
                found: describe(found),
            }),
            None => Err(unexpected_end(expected)),
        }
    }

    fn peek(&mut self) -> Result<Option<u8>, StreamError> {
        Ok(self.reader.fill_buf()?.first().copied())
    }

    fn skip_whitespace(&mut self) -> Result<(), StreamError> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(());
            }
            let skipped = buf
                .iter()
                .take_while(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
                .count();
            let exhausted = skipped == buf.len();
            self.reader.consume(skipped);
            if !exhausted {
                return Ok(());
            }
        }
    }
}

fn describe(byte: u8) -> String {
    format!("{:?}", byte as char)
}

fn unexpected_end(expected: &'static str) -> StreamError {
    StreamError::Malformed {
        expected,
        found: "end of input".into(),
    }
}

#[derive(Debug)]
enum StreamEvent<T> {
    Record { ordinal: usize, record: T },
    Failed(StreamError),
    Finished,
}

/// Async view over an [`ItemsReader`] running on the blocking pool.
pub struct RecordStream<T> {
    rx: mpsc::Receiver<StreamEvent<T>>,
    finished: bool,
}

impl<T> RecordStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Starts decoding `file`. At most `capacity` decoded records are buffered ahead of the consumer.
    pub fn spawn(file: File, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        tokio::task::spawn_blocking(move || {
            let mut reader = ItemsReader::new(BufReader::new(file));
            loop {
                let event = match reader.next_record::<T>() {
                    Ok(Some(record)) => StreamEvent::Record {
                        ordinal: reader.ordinal(),
                        record,
                    },
                    Ok(None) => StreamEvent::Finished,
                    Err(error) => StreamEvent::Failed(error),
                };
                let terminal = !matches!(event, StreamEvent::Record { .. });
                // A closed channel means the consumer gave up on this run.
                if tx.blocking_send(event).is_err() || terminal {
                    return;
                }
            }
        });

        RecordStream {
            rx,
            finished: false,
        }
    }

    /// Next `(ordinal, record)`, `None` after the document closed cleanly.
    pub async fn next(&mut self) -> Result<Option<(usize, T)>, StreamError> {
        if self.finished {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(StreamEvent::Record { ordinal, record }) => Ok(Some((ordinal, record))),
            Some(StreamEvent::Finished) => {
                self.finished = true;
                Ok(None)
            }
            Some(StreamEvent::Failed(error)) => {
                self.finished = true;
                Err(error)
            }
            None => {
                self.finished = true;
                Err(StreamError::Interrupted)
            }
        }
    }
}
