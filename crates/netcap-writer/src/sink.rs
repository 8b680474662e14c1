//
// MIT License
//
// Copyright (c) 2024 Firelink Data
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//
// File created: 2024-11-02
// Last updated: 2024-11-02
//

use std::fs::File;
use std::io::{self, BufWriter, Write};

use flate2::write::GzEncoder;
use flate2::Compression;

/// The underlying byte sink a [`crate::writer::RecordWriter`] writes
/// through: either a plain buffered file, or the same buffered file wrapped
/// in a gzip encoder when compression was requested.
pub enum Sink {
    Plain(BufWriter<File>),
    Gz(Box<GzEncoder<BufWriter<File>>>),
}

impl Sink {
    pub fn plain(file: File, buf_capacity: usize) -> Self {
        Sink::Plain(BufWriter::with_capacity(buf_capacity, file))
    }

    pub fn gzip(file: File, buf_capacity: usize) -> Self {
        Sink::Gz(Box::new(GzEncoder::new(
            BufWriter::with_capacity(buf_capacity, file),
            Compression::default(),
        )))
    }

    /// Flush, close the compression stream if any, and sync the underlying
    /// file to disk.
    pub fn finish(self) -> io::Result<File> {
        let file = match self {
            Sink::Plain(mut buffered) => {
                buffered.flush()?;
                buffered.into_inner().map_err(|e| e.into_error())?
            }
            Sink::Gz(encoder) => {
                let mut buffered = encoder.finish()?;
                buffered.flush()?;
                buffered.into_inner().map_err(|e| e.into_error())?
            }
        };
        file.sync_all()?;
        Ok(file)
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gz(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gz(w) => w.flush(),
        }
    }
}
