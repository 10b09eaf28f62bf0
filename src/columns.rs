use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of data columns mirrored into the sheet.
pub const COLUMN_COUNT: usize = 16;

/// Header labels written into row 1, in column order.
pub const SHEET_HEADERS: [&str; COLUMN_COUNT] = [
    "Car Details",
    "Plate No",
    "Email ID",
    "Contact Number",
    "Customer Name",
    "Trips",
    "Applied at",
    "Source",
    "Owner/ Available days",
    "Driver Rating",
    "Satisfaction Rate",
    "Acceptance Rate",
    "Cancellation Rate",
    "Tenure",
    "Rating",
    "Uber Pro",
];

/// JSON keys of the record fields, aligned with `SHEET_HEADERS`.
pub const FIELD_KEYS: [&str; COLUMN_COUNT] = [
    "carDetails",
    "plateNo",
    "email",
    "contactNumber",
    "customerName",
    "trips",
    "appliedAt",
    "source",
    "ownerOrAvailableDays",
    "driverRating",
    "satisfactionRate",
    "acceptanceRate",
    "cancellationRate",
    "tenure",
    "rating",
    "uberPro",
];

/// The sixteen free-text attributes of a tracked car entry.
///
/// Every field defaults to the empty string when it is missing from the
/// incoming JSON, so partial bodies deserialize cleanly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryFields {
    pub car_details: String,
    pub plate_no: String,
    pub email: String,
    pub contact_number: String,
    pub customer_name: String,
    pub trips: String,
    pub applied_at: String,
    pub source: String,
    pub owner_or_available_days: String,
    pub driver_rating: String,
    pub satisfaction_rate: String,
    pub acceptance_rate: String,
    pub cancellation_rate: String,
    pub tenure: String,
    pub rating: String,
    pub uber_pro: String,
}

impl EntryFields {
    /// Values shown in a blank data-entry form.
    pub fn form_defaults() -> Self {
        EntryFields {
            satisfaction_rate: "100%".to_string(),
            acceptance_rate: "100%".to_string(),
            cancellation_rate: "100%".to_string(),
            ..Default::default()
        }
    }

    /// Encode the entry as one sheet row, in header order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.car_details.clone(),
            self.plate_no.clone(),
            self.email.clone(),
            self.contact_number.clone(),
            self.customer_name.clone(),
            self.trips.clone(),
            self.applied_at.clone(),
            self.source.clone(),
            self.owner_or_available_days.clone(),
            self.driver_rating.clone(),
            self.satisfaction_rate.clone(),
            self.acceptance_rate.clone(),
            self.cancellation_rate.clone(),
            self.tenure.clone(),
            self.rating.clone(),
            self.uber_pro.clone(),
        ]
    }

    /// Rebuild an entry from cells in header order; missing cells are empty.
    pub fn from_row(row: &[String]) -> Self {
        let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
        EntryFields {
            car_details: cell(0),
            plate_no: cell(1),
            email: cell(2),
            contact_number: cell(3),
            customer_name: cell(4),
            trips: cell(5),
            applied_at: cell(6),
            source: cell(7),
            owner_or_available_days: cell(8),
            driver_rating: cell(9),
            satisfaction_rate: cell(10),
            acceptance_rate: cell(11),
            cancellation_rate: cell(12),
            tenure: cell(13),
            rating: cell(14),
            uber_pro: cell(15),
        }
    }

    /// Lenient conversion from a raw JSON body; see `row_from_json`.
    pub fn from_json(body: &Value) -> Self {
        Self::from_row(&row_from_json(body))
    }
}

/// Encode an arbitrary JSON body as a sheet row.
///
/// Never fails: absent keys, `null`, nested objects and arrays all become
/// empty cells, and a non-object input yields a row of empty cells.
/// Numbers and booleans keep their JSON text.
pub fn row_from_json(body: &Value) -> Vec<String> {
    FIELD_KEYS
        .iter()
        .map(|key| match body.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        })
        .collect()
}

/// Header labels as an owned row, ready to be written.
pub fn header_row() -> Vec<String> {
    SHEET_HEADERS.iter().map(|h| h.to_string()).collect()
}
