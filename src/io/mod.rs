// Copyright 2020 @TwoCookingMice

pub mod exr_utils;
pub mod texture_utils;
