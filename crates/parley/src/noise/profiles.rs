// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

//! Noise profiles keyed by client archetype and intensity bucket.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::models::{ClientArchetype, Style};

/// Rates scaled up when a mid-intensity message falls back to the low profile.
const MID_SCALE: f64 = 1.3;
const MID_CAP: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypoKind {
    KeyboardTypo,
    Transposition,
    MissingLetter,
    WrongSpaces,
    ConfusableWord,
}

impl TypoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypoKind::KeyboardTypo => "keyboard_typo",
            TypoKind::Transposition => "transposition",
            TypoKind::MissingLetter => "missing_letter",
            TypoKind::WrongSpaces => "wrong_spaces",
            TypoKind::ConfusableWord => "confusable_word",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityBucket {
    Low,
    Mid,
    High,
}

impl IntensityBucket {
    pub fn from_intensity(intensity: u8) -> Self {
        match intensity {
            0..=2 => IntensityBucket::Low,
            3 => IntensityBucket::Mid,
            _ => IntensityBucket::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseProfile {
    #[serde(default)]
    pub typo_kinds: Vec<TypoKind>,
    pub typo_rate: f64,
    pub lowercase_rate: f64,
    pub caps_rate: f64,
    pub filler_rate: f64,
    pub slang_rate: f64,
    pub punct_drop_rate: f64,
    pub split_rate: f64,
    pub ellipsis_rate: f64,
}

impl NoiseProfile {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        typo_kinds: &[TypoKind],
        typo_rate: f64,
        lowercase_rate: f64,
        caps_rate: f64,
        filler_rate: f64,
        slang_rate: f64,
        punct_drop_rate: f64,
        split_rate: f64,
        ellipsis_rate: f64,
    ) -> Self {
        Self {
            typo_kinds: typo_kinds.to_vec(),
            typo_rate,
            lowercase_rate,
            caps_rate,
            filler_rate,
            slang_rate,
            punct_drop_rate,
            split_rate,
            ellipsis_rate,
        }
    }

    fn scaled_for_mid(&self) -> Self {
        let scale = |rate: f64| (rate * MID_SCALE).min(MID_CAP);
        Self {
            typo_rate: scale(self.typo_rate),
            caps_rate: scale(self.caps_rate),
            slang_rate: scale(self.slang_rate),
            ..self.clone()
        }
    }
}

impl Default for NoiseProfile {
    fn default() -> Self {
        Self::new(&[TypoKind::KeyboardTypo], 0.12, 0.20, 0.10, 0.15, 0.15, 0.25, 0.08, 0.05)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub archetype: ClientArchetype,
    pub bucket: IntensityBucket,
    pub profile: NoiseProfile,
}

/// Immutable profile table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseProfiles {
    pub entries: Vec<ProfileEntry>,
    pub style_overrides: Vec<(Style, NoiseProfile)>,
    pub fallback: NoiseProfile,
}

impl NoiseProfiles {
    /// Resolves the profile for one client message.
    ///
    /// A style override wins, then the exact `(archetype, bucket)` entry, then
    /// the archetype's low entry (scaled when the bucket is mid), then the
    /// fallback.
    pub fn lookup(
        &self,
        archetype: ClientArchetype,
        intensity: u8,
        style: Style,
    ) -> Cow<'_, NoiseProfile> {
        if let Some((_, p)) = self.style_overrides.iter().find(|(s, _)| *s == style) {
            return Cow::Borrowed(p);
        }
        let bucket = IntensityBucket::from_intensity(intensity);
        if let Some(p) = self.find(archetype, bucket) {
            return Cow::Borrowed(p);
        }
        match self.find(archetype, IntensityBucket::Low) {
            Some(low) if bucket == IntensityBucket::Mid => Cow::Owned(low.scaled_for_mid()),
            Some(low) => Cow::Borrowed(low),
            None => Cow::Borrowed(&self.fallback),
        }
    }

    fn find(&self, archetype: ClientArchetype, bucket: IntensityBucket) -> Option<&NoiseProfile> {
        self.entries
            .iter()
            .find(|e| e.archetype == archetype && e.bucket == bucket)
            .map(|e| &e.profile)
    }
}

impl Default for NoiseProfiles {
    fn default() -> Self {
        use ClientArchetype::*;
        use IntensityBucket::{High, Low};
        use TypoKind::*;

        let entry = |archetype, bucket, profile| ProfileEntry {
            archetype,
            bucket,
            profile,
        };
        let p = NoiseProfile::new;

        Self {
            entries: vec![
                entry(Karen, Low, p(&[Transposition], 0.08, 0.0, 0.15, 0.05, 0.0, 0.20, 0.05, 0.0)),
                entry(Karen, High, p(&[Transposition, KeyboardTypo], 0.25, 0.0, 0.70, 0.0, 0.10, 0.10, 0.15, 0.0)),
                entry(AngryVeteran, Low, p(&[Transposition], 0.10, 0.0, 0.20, 0.05, 0.05, 0.20, 0.08, 0.0)),
                entry(AngryVeteran, High, p(&[Transposition, KeyboardTypo], 0.30, 0.0, 0.55, 0.0, 0.15, 0.15, 0.12, 0.0)),
                entry(ElderlyConfused, Low, p(&[MissingLetter, ConfusableWord], 0.40, 0.60, 0.0, 0.30, 0.0, 0.50, 0.05, 0.05)),
                entry(ElderlyConfused, High, p(&[MissingLetter, ConfusableWord], 0.55, 0.70, 0.0, 0.40, 0.0, 0.60, 0.08, 0.10)),
                entry(TechConfused, Low, p(&[WrongSpaces, MissingLetter], 0.20, 0.30, 0.05, 0.20, 0.05, 0.30, 0.10, 0.05)),
                entry(YoungProfessional, Low, p(&[KeyboardTypo], 0.15, 0.50, 0.05, 0.15, 0.40, 0.60, 0.20, 0.0)),
                entry(YoungProfessional, High, p(&[KeyboardTypo, Transposition], 0.25, 0.40, 0.20, 0.10, 0.35, 0.55, 0.20, 0.0)),
                entry(Conspirologist, Low, p(&[KeyboardTypo], 0.10, 0.15, 0.40, 0.05, 0.05, 0.30, 0.10, 0.15)),
                entry(Conspirologist, High, p(&[KeyboardTypo], 0.15, 0.10, 0.60, 0.0, 0.05, 0.20, 0.15, 0.10)),
                entry(Grieving, Low, p(&[MissingLetter], 0.15, 0.40, 0.0, 0.25, 0.05, 0.40, 0.15, 0.20)),
                entry(CallingBluff, High, p(&[Transposition, KeyboardTypo], 0.20, 0.0, 0.50, 0.05, 0.15, 0.15, 0.12, 0.0)),
            ],
            style_overrides: vec![(
                Style::PassiveAggressive,
                p(&[], 0.05, 0.10, 0.0, 0.10, 0.20, 0.10, 0.08, 0.35),
            )],
            fallback: NoiseProfile::default(),
        }
    }
}
