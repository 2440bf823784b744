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

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! closed_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every value in declaration order. Sampling indexes into this.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                let s = s.trim().to_lowercase();
                match s.as_str() {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

closed_enum!(Complexity {
    Simple => "simple",
    Complex => "complex",
});

closed_enum!(Outcome {
    ResolvedQuick => "resolved_quick",
    ResolvedNeutral => "resolved_neutral",
    UnresolvedPassive => "unresolved_passive",
    UnresolvedRagequit => "unresolved_ragequit",
    Conflict => "conflict",
    InfoOnly => "info_only",
});

closed_enum!(Style {
    Casual => "casual",
    Aggressive => "aggressive",
    Formal => "formal",
    PassiveAggressive => "passive_aggressive",
});

closed_enum!(ClientArchetype {
    Karen => "karen",
    AngryVeteran => "angry_veteran",
    ElderlyConfused => "elderly_confused",
    TechConfused => "tech_confused",
    YoungProfessional => "young_professional",
    SelfInflicted => "self_inflicted",
    Conspirologist => "conspirologist",
    Grieving => "grieving",
    WrongDepartment => "wrong_department",
    CallingBluff => "calling_bluff",
    EntitledParent => "entitled_parent",
});

closed_enum!(AgentArchetype {
    VeteranTired => "veteran_tired",
    BurnedOut => "burned_out",
    HandsTied => "hands_tied",
    EagerHelper => "eager_helper",
    ByTheBook => "by_the_book",
    NewbieOverwhelmed => "newbie_overwhelmed",
    StressedMultitask => "stressed_multitask",
});

impl Outcome {
    /// Outcomes whose final message belongs to the client.
    pub fn ends_with_client(&self) -> bool {
        matches!(self, Outcome::UnresolvedRagequit | Outcome::UnresolvedPassive)
    }
}

/// Sentinel twist value meaning "no twist".
pub const NO_TWIST: &str = "none";

/// Sampled configuration for one dialogue. Never mutated after sampling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioParams {
    pub seed: u64,
    pub complexity: Complexity,
    pub sector: String,
    pub topic: String,
    pub outcome: Outcome,
    pub style: Style,
    pub client_archetype: ClientArchetype,
    pub agent_archetype: AgentArchetype,
    pub twist: String,
    pub conflict_type: String,
    pub emotional_arc: String,
    pub target_message_count: usize,
    pub use_alt_model: bool,
}

/// Field overrides applied by [`ScenarioParams::with_overrides`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOverrides {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub outcome: Option<Outcome>,
    #[serde(default)]
    pub style: Option<Style>,
    #[serde(default)]
    pub target_message_count: Option<usize>,
    #[serde(default)]
    pub complexity: Option<Complexity>,
}

impl ScenarioParams {
    pub fn has_twist(&self) -> bool {
        self.twist != NO_TWIST
    }

    /// Copy with the given fields replaced. The original stays untouched.
    pub fn with_overrides(&self, overrides: &ScenarioOverrides) -> Self {
        let mut next = self.clone();
        if let Some(topic) = &overrides.topic {
            next.topic = topic.clone();
        }
        if let Some(outcome) = overrides.outcome {
            next.outcome = outcome;
        }
        if let Some(style) = overrides.style {
            next.style = style;
        }
        if let Some(complexity) = overrides.complexity {
            next.complexity = complexity;
        }
        if let Some(count) = overrides.target_message_count {
            next.target_message_count = count.max(2);
        }
        next
    }
}
