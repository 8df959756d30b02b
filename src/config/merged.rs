use crate::transparency::reference::BackgroundSampling;

use super::job::{Conversion, Job};
use super::settings::Settings;

#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub tolerance: u8,
    pub background_sampling: BackgroundSampling,
    pub compress: bool,
    pub prune_objects: bool,
    pub max_input_bytes: u64,
}

impl MergedConfig {
    /// JobのOption値がSomeならJobの値を、NoneならSettingsの値を使用する。
    pub fn new(settings: &Settings, job: &Job) -> Self {
        MergedConfig {
            tolerance: job.tolerance.unwrap_or(settings.tolerance),
            background_sampling: job
                .background_sampling
                .unwrap_or(settings.background_sampling),
            compress: job.compress.unwrap_or(settings.compress),
            prune_objects: settings.prune_objects,
            max_input_bytes: settings.max_input_bytes,
        }
    }

    /// 変換ジョブ用。保存オプションは使わないのでSettingsの値のまま。
    pub fn for_conversion(settings: &Settings, conversion: &Conversion) -> Self {
        MergedConfig {
            tolerance: conversion.tolerance.unwrap_or(settings.tolerance),
            background_sampling: conversion
                .background_sampling
                .unwrap_or(settings.background_sampling),
            compress: settings.compress,
            prune_objects: settings.prune_objects,
            max_input_bytes: settings.max_input_bytes,
        }
    }
}
