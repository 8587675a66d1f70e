// SPDX-License-Identifier: MPL-2.0

//! External frame producers feeding the texture sources

pub mod camera;
pub mod overlay;
