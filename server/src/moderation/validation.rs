//! Boundary checks run before any store access.

use rust_decimal::Decimal;

use super::error::ModerationError;
use crate::models::{EventDraft, EventPatch, TicketDraft};
use crate::store::{NewPendingEvent, NewTicket};

/// Prices are stored as `NUMERIC(14, 2)`.
const PRICE_SCALE: u32 = 2;
const PRICE_LIMIT: i64 = 1_000_000_000_000;

fn required(field: &str, value: &str) -> Result<String, ModerationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ModerationError::Validation(format!("{} is required", field)))
    } else {
        Ok(trimmed.to_string())
    }
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn ticket(index: usize, draft: &TicketDraft) -> Result<NewTicket, ModerationError> {
    let name = required(&format!("tickets[{}].name", index), &draft.name)?;

    if draft.price.is_sign_negative() && !draft.price.is_zero() {
        return Err(ModerationError::Validation(format!(
            "tickets[{}].price must be a non-negative number",
            index
        )));
    }
    if draft.price.normalize().scale() > PRICE_SCALE {
        return Err(ModerationError::Validation(format!(
            "tickets[{}].price must have at most {} decimal places",
            index, PRICE_SCALE
        )));
    }
    if draft.price >= Decimal::from(PRICE_LIMIT) {
        return Err(ModerationError::Validation(format!(
            "tickets[{}].price must be less than {}",
            index, PRICE_LIMIT
        )));
    }
    if draft.quantity.is_some_and(|q| q < 0) {
        return Err(ModerationError::Validation(format!(
            "tickets[{}].quantity must not be negative",
            index
        )));
    }

    Ok(NewTicket {
        name,
        description: optional(&draft.description),
        price: draft.price,
        quantity: draft.quantity,
    })
}

/// Validates a submission and normalises it into the rows to insert.
pub fn validate_draft(
    draft: &EventDraft,
) -> Result<(NewPendingEvent, Vec<NewTicket>), ModerationError> {
    let event = NewPendingEvent {
        title: required("title", &draft.title)?,
        description: required("description", &draft.description)?,
        location: required("location", &draft.location)?,
        date: draft.date,
        image_url: optional(&draft.image_url),
        organizer_id: required("organizer_id", &draft.organizer_id)?,
    };

    if draft.tickets.is_empty() {
        return Err(ModerationError::Validation(
            "at least one ticket required".to_string(),
        ));
    }
    let tickets = draft
        .tickets
        .iter()
        .enumerate()
        .map(|(i, t)| ticket(i, t))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((event, tickets))
}

/// Validates an edit; present string fields must not be blank.
pub fn validate_patch(patch: &EventPatch) -> Result<EventPatch, ModerationError> {
    if patch.is_empty() {
        return Err(ModerationError::Validation(
            "no editable fields supplied".to_string(),
        ));
    }

    let field = |name: &str, value: &Option<String>| {
        value.as_deref().map(|v| required(name, v)).transpose()
    };

    Ok(EventPatch {
        title: field("title", &patch.title)?,
        description: field("description", &patch.description)?,
        location: field("location", &patch.location)?,
        date: patch.date,
        image_url: optional(&patch.image_url),
    })
}

pub fn validate_actor(field: &str, actor: &str) -> Result<String, ModerationError> {
    required(field, actor)
}

pub fn validate_reason(reason: &str) -> Result<String, ModerationError> {
    required("rejection_reason", reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ticket_draft(name: &str, price: i64) -> TicketDraft {
        TicketDraft {
            name: name.to_string(),
            price: Decimal::from(price),
            quantity: None,
            description: None,
        }
    }

    fn draft() -> EventDraft {
        EventDraft {
            title: "  Indie Fest ".to_string(),
            description: "Three stages of local bands".to_string(),
            location: "Bandung".to_string(),
            date: Utc::now(),
            image_url: Some("   ".to_string()),
            organizer_id: "org-1".to_string(),
            tickets: vec![ticket_draft("VIP", 500_000), ticket_draft("Regular", 150_000)],
        }
    }

    fn message(err: ModerationError) -> String {
        match err {
            ModerationError::Validation(msg) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_draft_is_normalised() {
        let (event, tickets) = validate_draft(&draft()).unwrap();

        assert_eq!(event.title, "Indie Fest");
        assert_eq!(event.image_url, None);
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[1].price, Decimal::from(150_000));
    }

    #[test]
    fn test_empty_ticket_list_is_rejected() {
        let mut d = draft();
        d.tickets.clear();

        assert_eq!(
            message(validate_draft(&d).unwrap_err()),
            "at least one ticket required"
        );
    }

    #[test]
    fn test_blank_required_field_is_rejected() {
        let mut d = draft();
        d.organizer_id = " ".to_string();

        assert_eq!(
            message(validate_draft(&d).unwrap_err()),
            "organizer_id is required"
        );
    }

    #[test]
    fn test_negative_price_is_rejected() {
        let mut d = draft();
        d.tickets.push(ticket_draft("Broken", -1));

        assert_eq!(
            message(validate_draft(&d).unwrap_err()),
            "tickets[2].price must be a non-negative number"
        );
    }

    #[test]
    fn test_free_ticket_is_allowed() {
        let mut d = draft();
        d.tickets = vec![ticket_draft("Free entry", 0)];

        assert!(validate_draft(&d).is_ok());
    }

    #[test]
    fn test_sub_cent_price_is_rejected() {
        let mut d = draft();
        d.tickets[0].price = Decimal::new(5, 3);

        assert_eq!(
            message(validate_draft(&d).unwrap_err()),
            "tickets[0].price must have at most 2 decimal places"
        );
    }

    #[test]
    fn test_trailing_zeros_do_not_count_as_precision() {
        let mut d = draft();
        d.tickets[0].price = Decimal::new(1_500_000, 4);

        let (_, tickets) = validate_draft(&d).unwrap();
        assert_eq!(tickets[0].price, Decimal::from(150));
    }

    #[test]
    fn test_price_beyond_column_range_is_rejected() {
        let mut d = draft();
        d.tickets[1].price = Decimal::from(1_000_000_000_000i64);

        assert_eq!(
            message(validate_draft(&d).unwrap_err()),
            "tickets[1].price must be less than 1000000000000"
        );

        d.tickets[1].price = Decimal::new(99_999_999_999_999, 2);
        assert!(validate_draft(&d).is_ok());
    }

    #[test]
    fn test_negative_quantity_is_rejected() {
        let mut d = draft();
        d.tickets[0].quantity = Some(-5);

        assert!(validate_draft(&d).is_err());
    }

    #[test]
    fn test_patch_rules() {
        assert!(validate_patch(&EventPatch::default()).is_err());

        let blank_title = EventPatch {
            title: Some("".to_string()),
            ..Default::default()
        };
        assert_eq!(
            message(validate_patch(&blank_title).unwrap_err()),
            "title is required"
        );

        let ok = EventPatch {
            location: Some(" Yogyakarta ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            validate_patch(&ok).unwrap().location.as_deref(),
            Some("Yogyakarta")
        );
    }

    #[test]
    fn test_reason_must_not_be_blank() {
        assert!(validate_reason("   ").is_err());
        assert_eq!(validate_reason("Venue lacks permit").unwrap(), "Venue lacks permit");
    }
}
