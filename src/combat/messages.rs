//! Combat messages and their delivery order
//!
//! Every event is told to the acting entity first, then to bystanders,
//! then to the target, so the victim always learns last.

use serde::{Deserialize, Serialize};

use crate::combat::resolution::MissKind;
use crate::core::types::EntityId;

/// One line of text for one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub recipient: EntityId,
    pub text: String,
}

/// The three views of one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub actor: EntityId,
    pub target: Option<EntityId>,
    pub to_actor: String,
    pub to_bystanders: Option<String>,
    pub to_target: Option<String>,
}

impl Broadcast {
    /// Only the actor hears this
    pub fn private(actor: EntityId, text: impl Into<String>) -> Self {
        Self {
            actor,
            target: None,
            to_actor: text.into(),
            to_bystanders: None,
            to_target: None,
        }
    }

    /// Actor and room, no target
    pub fn room(actor: EntityId, to_actor: impl Into<String>, to_room: impl Into<String>) -> Self {
        Self {
            actor,
            target: None,
            to_actor: to_actor.into(),
            to_bystanders: Some(to_room.into()),
            to_target: None,
        }
    }

    pub fn exchange(
        actor: EntityId,
        target: EntityId,
        to_actor: impl Into<String>,
        to_bystanders: impl Into<String>,
        to_target: impl Into<String>,
    ) -> Self {
        Self {
            actor,
            target: Some(target),
            to_actor: to_actor.into(),
            to_bystanders: Some(to_bystanders.into()),
            to_target: Some(to_target.into()),
        }
    }

    /// Flatten into deliveries: actor, then each bystander, then target
    ///
    /// The actor and target are filtered out of `bystanders`.
    pub fn deliver<I>(self, bystanders: I) -> Vec<Delivery>
    where
        I: IntoIterator<Item = EntityId>,
    {
        let mut out = vec![Delivery {
            recipient: self.actor,
            text: self.to_actor,
        }];

        if let Some(text) = self.to_bystanders {
            for id in bystanders {
                if id != self.actor && Some(id) != self.target {
                    out.push(Delivery {
                        recipient: id,
                        text: text.clone(),
                    });
                }
            }
        }

        if let (Some(target), Some(text)) = (self.target, self.to_target) {
            if target != self.actor {
                out.push(Delivery {
                    recipient: target,
                    text,
                });
            }
        }
        out
    }
}

/// How badly a blow hurt, graded on the share of hit points it took
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Hurt {
    NoEffect,
    Graze,
    Light,
    Bad,
    VeryBad,
    Smash,
    Crush,
    Massacre,
}

impl Hurt {
    pub fn from_percent(percent: i32) -> Self {
        match percent {
            i32::MIN..=0 => Hurt::NoEffect,
            1..=4 => Hurt::Graze,
            5..=10 => Hurt::Light,
            11..=20 => Hurt::Bad,
            21..=30 => Hurt::VeryBad,
            31..=50 => Hurt::Smash,
            51..=75 => Hurt::Crush,
            _ => Hurt::Massacre,
        }
    }

    /// Verb and trailing adverb
    pub fn phrase(self) -> (&'static str, &'static str) {
        match self {
            Hurt::NoEffect => ("has no effect on", ""),
            Hurt::Graze => ("grazes", ""),
            Hurt::Light => ("hurts", ""),
            Hurt::Bad => ("hurts", " badly"),
            Hurt::VeryBad => ("hurts", " very badly"),
            Hurt::Smash => ("smashes", ""),
            Hurt::Crush => ("crushes", ""),
            Hurt::Massacre => ("massacres", ""),
        }
    }
}

/// Condition adjective for a remaining hit point share, used in status text
pub fn condition(hit_points: i32, max_hit_points: i32) -> &'static str {
    if max_hit_points <= 0 {
        return "massacred";
    }
    match hit_points.max(0) * 100 / max_hit_points {
        100.. => "unharmed",
        90..=99 => "barely scratched",
        75..=89 => "lightly wounded",
        50..=74 => "wounded",
        25..=49 => "badly wounded",
        10..=24 => "very badly wounded",
        1..=9 => "near death",
        _ => "massacred",
    }
}

/// A landed blow
pub fn hit(
    actor: (EntityId, &str),
    target: (EntityId, &str),
    weapon: &str,
    location: &str,
    hurt: Hurt,
    critical: bool,
) -> Broadcast {
    let (verb, adverb) = hurt.phrase();
    let prefix = if critical { "A critical hit! " } else { "" };
    Broadcast::exchange(
        actor.0,
        target.0,
        format!("{prefix}Your {weapon} {verb} {}'s {location}{adverb}.", target.1),
        format!("{prefix}{}'s {weapon} {verb} {}'s {location}{adverb}.", actor.1, target.1),
        format!("{prefix}{}'s {weapon} {verb} your {location}{adverb}.", actor.1),
    )
}

/// A missed blow
pub fn miss(
    actor: (EntityId, &str),
    target: (EntityId, &str),
    weapon: &str,
    kind: MissKind,
) -> Broadcast {
    let (third, second) = match kind {
        MissKind::Parried => ("parries", "parry"),
        MissKind::Dodged => ("dodges", "dodge"),
    };
    Broadcast::exchange(
        actor.0,
        target.0,
        format!("{} {third} your {weapon}.", target.1),
        format!("{} {third} {}'s {weapon}.", target.1, actor.1),
        format!("You {second} {}'s {weapon}.", actor.1),
    )
}

pub fn death(killer: (EntityId, &str), victim: (EntityId, &str)) -> Broadcast {
    Broadcast::exchange(
        killer.0,
        victim.0,
        format!("You killed {}!", victim.1),
        format!("{} dies at the hands of {}.", victim.1, killer.1),
        format!("You have been killed by {}.", killer.1),
    )
}

/// Fleeing through `direction`, or failing to when None
pub fn flee(actor: (EntityId, &str), direction: Option<&str>) -> Broadcast {
    match direction {
        Some(dir) => Broadcast::room(
            actor.0,
            format!("You panic and flee {dir}!"),
            format!("{} panics and flees {dir}.", actor.1),
        ),
        None => Broadcast::room(
            actor.0,
            "You panic, but there is nowhere to run!",
            format!("{} looks around wildly for an escape.", actor.1),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_order_actor_bystanders_target() {
        let actor = EntityId::new();
        let target = EntityId::new();
        let watcher = EntityId::new();
        let broadcast = Broadcast::exchange(actor, target, "a", "b", "t");
        let deliveries = broadcast.deliver([target, watcher, actor]);

        let recipients: Vec<EntityId> = deliveries.iter().map(|d| d.recipient).collect();
        assert_eq!(recipients, vec![actor, watcher, target]);
        assert_eq!(deliveries[2].text, "t");
    }

    #[test]
    fn test_private_reaches_actor_only() {
        let actor = EntityId::new();
        let deliveries = Broadcast::private(actor, "x").deliver([EntityId::new()]);
        assert_eq!(deliveries.len(), 1);
    }

    #[test]
    fn test_hurt_grades() {
        assert_eq!(Hurt::from_percent(0), Hurt::NoEffect);
        assert_eq!(Hurt::from_percent(3), Hurt::Graze);
        assert_eq!(Hurt::from_percent(25), Hurt::VeryBad);
        assert_eq!(Hurt::from_percent(100), Hurt::Massacre);
        assert!(Hurt::Crush > Hurt::Light);
    }

    #[test]
    fn test_hit_text() {
        let a = EntityId::new();
        let b = EntityId::new();
        let msg = hit((a, "Aldo"), (b, "Bera"), "longsword", "arms", Hurt::Bad, false);
        assert_eq!(msg.to_actor, "Your longsword hurts Bera's arms badly.");
        assert_eq!(msg.to_target.as_deref(), Some("Aldo's longsword hurts your arms badly."));
    }

    #[test]
    fn test_condition_words() {
        assert_eq!(condition(50, 50), "unharmed");
        assert_eq!(condition(30, 50), "wounded");
        assert_eq!(condition(0, 50), "massacred");
    }
}
