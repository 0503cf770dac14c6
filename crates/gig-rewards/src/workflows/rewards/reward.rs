use serde::Serialize;

use super::domain::{RewardKind, RewardSpec};

/// Display fields copied onto a benefit at issuance time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewardDisplay {
    pub title: String,
    pub partner: String,
    pub validity: String,
}

/// Render a rule's reward for display, falling back to `fallback_name` when the reward is
/// absent or of an unrecognized kind.
pub fn format_reward(reward: Option<&RewardSpec>, fallback_name: &str) -> RewardDisplay {
    let Some(reward) = reward else {
        return fallback(fallback_name);
    };

    let (title, partner) = match &reward.kind {
        RewardKind::InsuranceDiscount => (format!("Insurance Discount {}%", reward.value), "SafeCover"),
        RewardKind::TaxConsultation => ("Tax Consultation".to_string(), "Taxie"),
        RewardKind::EarlyPayLimit => (format!("Early Pay Limit +${}", reward.value), "QuickPay"),
        RewardKind::Unrecognized(_) => return fallback(fallback_name),
    };

    let validity = match reward.duration_days {
        Some(days) if days > 0 => format!("{days} days"),
        _ => String::new(),
    };

    RewardDisplay {
        title,
        partner: partner.to_string(),
        validity,
    }
}

fn fallback(name: &str) -> RewardDisplay {
    RewardDisplay {
        title: name.to_string(),
        partner: String::new(),
        validity: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: RewardKind, value: &str, duration_days: Option<u32>) -> RewardSpec {
        RewardSpec {
            kind,
            value: value.to_string(),
            duration_days,
        }
    }

    #[test]
    fn insurance_discount_uses_percent_title() {
        let display = format_reward(
            Some(&spec(RewardKind::InsuranceDiscount, "20", Some(30))),
            "fallback",
        );
        assert_eq!(
            display,
            RewardDisplay {
                title: "Insurance Discount 20%".to_string(),
                partner: "SafeCover".to_string(),
                validity: "30 days".to_string(),
            }
        );
    }

    #[test]
    fn tax_consultation_omits_validity_without_duration() {
        let display = format_reward(Some(&spec(RewardKind::TaxConsultation, "", None)), "x");
        assert_eq!(display.title, "Tax Consultation");
        assert_eq!(display.partner, "Taxie");
        assert_eq!(display.validity, "");

        let display = format_reward(Some(&spec(RewardKind::TaxConsultation, "", Some(0))), "x");
        assert_eq!(display.validity, "");
    }

    #[test]
    fn early_pay_limit_uses_dollar_title() {
        let display = format_reward(
            Some(&spec(RewardKind::EarlyPayLimit, "200", Some(14))),
            "x",
        );
        assert_eq!(display.title, "Early Pay Limit +$200");
        assert_eq!(display.partner, "QuickPay");
        assert_eq!(display.validity, "14 days");
    }

    #[test]
    fn missing_or_unknown_reward_falls_back_to_name() {
        let expected = RewardDisplay {
            title: "Silver Insurance".to_string(),
            partner: String::new(),
            validity: String::new(),
        };
        assert_eq!(format_reward(None, "Silver Insurance"), expected);

        let unknown = spec(RewardKind::Unrecognized("gym_pass".to_string()), "1", Some(7));
        assert_eq!(format_reward(Some(&unknown), "Silver Insurance"), expected);
    }
}
