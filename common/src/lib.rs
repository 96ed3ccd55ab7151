//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Keybridge Common Types
//!
//! I/O free building blocks shared by the Keybridge gateway:
//! - Byte-stream decoding into control codes, UTF-8 runs and escape sequences
//! - Terminal capability descriptors and their escape sequence generators
//! - The in-band rendition markup language
//! - Locale guessing

pub mod decoder;
pub mod locale;
pub mod markup;
pub mod terminal;

pub use decoder::{Decoded, Decoder, FunctionCode, InputEvent};
pub use terminal::{TerminalDescriptor, TerminalKind, TerminalRegistry};
