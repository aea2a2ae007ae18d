use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Tier label on a piece of content.
///
/// Anything the data layer sends that is not one of the three known labels is
/// kept as `Unknown` so it can be denied rather than silently mapped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VisibilityTier {
    All,
    Premium,
    Vip,
    Unknown(String),
}

impl VisibilityTier {
    pub fn parse(s: &str) -> Self {
        match s {
            "all" => VisibilityTier::All,
            "premium" => VisibilityTier::Premium,
            "vip" => VisibilityTier::Vip,
            other => VisibilityTier::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            VisibilityTier::All => "all",
            VisibilityTier::Premium => "premium",
            VisibilityTier::Vip => "vip",
            VisibilityTier::Unknown(s) => s,
        }
    }
}

impl fmt::Display for VisibilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for VisibilityTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VisibilityTier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(VisibilityTier::parse(&s))
    }
}

/// Subscription tier on a viewer's account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Basic,
    Premium,
    Vip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Access policy between a viewer and a resource.
pub trait Authorize<V, R> {
    fn authorize(&self, viewer: &V, resource: &R) -> Decision;
}

/// Subscription tier gate for content.
///
/// Each content tier names the viewer tiers allowed to see it; there is no
/// ordering between tiers beyond this table.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityPolicy;

impl Authorize<SubscriptionTier, VisibilityTier> for VisibilityPolicy {
    fn authorize(&self, viewer: &SubscriptionTier, content: &VisibilityTier) -> Decision {
        let allowed: &[SubscriptionTier] = match content {
            VisibilityTier::All => return Decision::Allow,
            VisibilityTier::Premium => &[SubscriptionTier::Premium, SubscriptionTier::Vip],
            VisibilityTier::Vip => &[SubscriptionTier::Vip],
            VisibilityTier::Unknown(label) => {
                return Decision::Deny(format!("unrecognised visibility tier '{}'", label));
            }
        };

        if allowed.contains(viewer) {
            Decision::Allow
        } else {
            Decision::Deny(format!("{} content requires a higher subscription", content))
        }
    }
}

pub fn can_view(content: &VisibilityTier, viewer: SubscriptionTier) -> bool {
    VisibilityPolicy.authorize(&viewer, content).is_allowed()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIERS: [SubscriptionTier; 3] = [
        SubscriptionTier::Basic,
        SubscriptionTier::Premium,
        SubscriptionTier::Vip,
    ];

    #[test]
    fn all_content_is_public() {
        for tier in TIERS {
            assert!(can_view(&VisibilityTier::All, tier));
        }
    }

    #[test]
    fn premium_content() {
        assert!(!can_view(&VisibilityTier::Premium, SubscriptionTier::Basic));
        assert!(can_view(&VisibilityTier::Premium, SubscriptionTier::Premium));
        assert!(can_view(&VisibilityTier::Premium, SubscriptionTier::Vip));
    }

    #[test]
    fn vip_content() {
        for tier in TIERS {
            assert_eq!(
                can_view(&VisibilityTier::Vip, tier),
                tier == SubscriptionTier::Vip
            );
        }
    }

    #[test]
    fn unknown_tier_fails_closed() {
        let tier = VisibilityTier::parse("followers");
        for viewer in TIERS {
            assert!(!can_view(&tier, viewer));
        }
        assert!(matches!(
            VisibilityPolicy.authorize(&SubscriptionTier::Vip, &tier),
            Decision::Deny(_)
        ));
    }

    #[test]
    fn tiers_from_json() {
        let tier: VisibilityTier = serde_json::from_str("\"vip\"").unwrap();
        assert_eq!(tier, VisibilityTier::Vip);
        let tier: VisibilityTier = serde_json::from_str("\"VIP\"").unwrap();
        assert_eq!(tier, VisibilityTier::Unknown("VIP".into()));

        let viewer: SubscriptionTier = serde_json::from_str("\"premium\"").unwrap();
        assert_eq!(viewer, SubscriptionTier::Premium);
        assert!(serde_json::from_str::<SubscriptionTier>("\"gold\"").is_err());
    }
}
