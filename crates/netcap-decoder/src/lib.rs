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

pub mod builtin;
pub mod layer;
pub mod registry;
pub mod selection;
pub mod stream;

pub use builtin::{build_layer_decoder, build_tcp_connection_decoder, DEFAULT_DECODER_NAMES, DEFAULT_IDLE_TIMEOUT_NANOS, DEFAULT_MAX_OPEN_FLOWS};
pub use layer::LayerDecoder;
pub use registry::{DecoderRegistry, DecoderRegistryBuilder};
pub use selection::select_decoder_names;
pub use stream::{StreamDecoder, TcpConnectionDecoder};
