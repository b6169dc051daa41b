//! # Validation Module
//!
//! Input validation for booking requests, run before business logic.
//!
//! Layering matches the rest of the engine: these checks catch
//! malformed input early; the database adds NOT NULL / UNIQUE / foreign
//! key constraints underneath, and the allocator re-checks the
//! inventory-level rules under its transaction.

use crate::error::ValidationError;
use crate::types::{ReservationDraft, RoomRequest};
use crate::MAX_ROOMS_PER_BOOKING;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a business code (room type code, rate plan code).
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 30 characters
/// - Only alphanumeric characters, hyphens, underscores
pub fn validate_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.len() > 30 {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: 30,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a room number.
///
/// Free-form (hotels use "101", "PH-2", "0012") but bounded and
/// non-empty.
pub fn validate_room_number(room_number: &str) -> ValidationResult<()> {
    let room_number = room_number.trim();

    if room_number.is_empty() {
        return Err(ValidationError::Required {
            field: "room_number".to_string(),
        });
    }

    if room_number.len() > 20 {
        return Err(ValidationError::TooLong {
            field: "room_number".to_string(),
            max: 20,
        });
    }

    Ok(())
}

/// Validates an ISO 4217 currency code: exactly 3 ASCII uppercase letters.
pub fn validate_currency(code: &str) -> ValidationResult<()> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a 3-letter ISO 4217 code".to_string(),
        });
    }
    Ok(())
}

/// Validates a UUID string format.
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Booking Validators
// =============================================================================

/// Validates the guest counts of one room request.
///
/// Capacity against the room type's limits is checked separately by the
/// allocator (it needs the RoomType row); this catches nonsensical input.
pub fn validate_guest_counts(request: &RoomRequest) -> ValidationResult<()> {
    if request.adults <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "adults".to_string(),
        });
    }
    if request.children < 0 {
        return Err(ValidationError::OutOfRange {
            field: "children".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates the shape of a reservation draft: non-empty, bounded line
/// count, sane guest counts, well-formed ids. Date-range validity is
/// enforced by `StayRange` construction.
pub fn validate_draft(draft: &ReservationDraft) -> ValidationResult<()> {
    if draft.guest_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "guest_id".to_string(),
        });
    }

    if draft.rooms.is_empty() {
        return Err(ValidationError::EmptyReservation);
    }

    if draft.rooms.len() > MAX_ROOMS_PER_BOOKING {
        return Err(ValidationError::OutOfRange {
            field: "rooms".to_string(),
            min: 1,
            max: MAX_ROOMS_PER_BOOKING as i64,
        });
    }

    for room in &draft.rooms {
        validate_guest_counts(room)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn request(adults: i64, children: i64) -> RoomRequest {
        RoomRequest {
            room_type_id: "rt1".into(),
            rate_plan_id: "rp1".into(),
            requested_room_id: None,
            adults,
            children,
        }
    }

    fn draft(rooms: Vec<RoomRequest>) -> ReservationDraft {
        ReservationDraft {
            property_id: "p1".into(),
            guest_id: "g1".into(),
            check_in: "2024-06-01".parse().unwrap(),
            check_out: "2024-06-03".parse().unwrap(),
            rooms,
        }
    }

    #[test]
    fn test_validate_code() {
        assert!(validate_code("DOUBLE").is_ok());
        assert!(validate_code("BAR-2024").is_ok());
        assert!(validate_code("").is_err());
        assert!(validate_code("has space").is_err());
        assert!(validate_code(&"A".repeat(40)).is_err());
    }

    #[test]
    fn test_validate_room_number() {
        assert!(validate_room_number("101").is_ok());
        assert!(validate_room_number("PH-2").is_ok());
        assert!(validate_room_number("").is_err());
        assert!(validate_room_number(&"9".repeat(30)).is_err());
    }

    #[test]
    fn test_validate_currency() {
        assert!(validate_currency("USD").is_ok());
        assert!(validate_currency("usd").is_err());
        assert!(validate_currency("US").is_err());
        assert!(validate_currency("DOLL").is_err());
    }

    #[test]
    fn test_validate_guest_counts() {
        assert!(validate_guest_counts(&request(2, 1)).is_ok());
        assert!(validate_guest_counts(&request(1, 0)).is_ok());
        assert!(validate_guest_counts(&request(0, 1)).is_err());
        assert!(validate_guest_counts(&request(2, -1)).is_err());
    }

    #[test]
    fn test_validate_draft() {
        assert!(validate_draft(&draft(vec![request(2, 0)])).is_ok());
        assert!(matches!(
            validate_draft(&draft(vec![])),
            Err(ValidationError::EmptyReservation)
        ));

        let mut no_guest = draft(vec![request(2, 0)]);
        no_guest.guest_id = "  ".into();
        assert!(validate_draft(&no_guest).is_err());

        let oversized = draft(vec![request(1, 0); MAX_ROOMS_PER_BOOKING + 1]);
        assert!(validate_draft(&oversized).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("not-a-uuid").is_err());
    }
}
