//! Logistics API request and response types.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::aggregates::{Order, PaymentMethod};

/// Package dimensions entered by staff when booking a shipment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackageDetails {
    /// Centimetres.
    pub length: Decimal,
    pub breadth: Decimal,
    pub height: Decimal,
    /// Kilograms.
    pub weight: Decimal,
    /// Preferred courier; the provider picks one when absent.
    #[serde(default)]
    pub courier_id: Option<u32>,
}

impl PackageDetails {
    pub fn is_valid(&self) -> bool {
        [self.length, self.breadth, self.height, self.weight].iter().all(|d| *d > Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    pub order_id: String,
    pub order_date: String,
    pub pickup_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub comment: String,
    pub billing_customer_name: String,
    pub billing_last_name: String,
    pub billing_address: String,
    pub billing_address_2: String,
    pub billing_city: String,
    pub billing_pincode: String,
    pub billing_state: String,
    pub billing_country: String,
    pub billing_email: String,
    pub billing_phone: String,
    pub shipping_is_billing: bool,
    pub order_items: Vec<OrderItem>,
    pub payment_method: &'static str,
    pub shipping_charges: Decimal,
    pub total_discount: Decimal,
    pub sub_total: Decimal,
    pub length: Decimal,
    pub breadth: Decimal,
    pub height: Decimal,
    pub weight: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub name: String,
    pub sku: String,
    pub units: u32,
    pub selling_price: Decimal,
}

impl CreateOrderRequest {
    /// Build the provider payload from a stored order.
    pub fn from_order(order: &Order, package: &PackageDetails, pickup_location: &str, channel_id: Option<String>) -> Self {
        let record = order.record();
        let (first_name, last_name) = split_name(&record.customer.name);
        let address = &record.shipping_address;
        Self {
            order_id: record.order_number.to_string(),
            order_date: record.created_at.format("%Y-%m-%d %H:%M").to_string(),
            pickup_location: pickup_location.to_string(),
            channel_id,
            comment: record.notes.clone().unwrap_or_default(),
            billing_customer_name: first_name,
            billing_last_name: last_name,
            billing_address: address.line1.clone(),
            billing_address_2: address.line2.clone().unwrap_or_default(),
            billing_city: address.city.clone(),
            billing_pincode: address.pincode.clone(),
            billing_state: address.state.clone(),
            billing_country: address.country.clone(),
            billing_email: record.customer.email.clone(),
            billing_phone: record.customer.phone.clone(),
            shipping_is_billing: true,
            order_items: record
                .items
                .iter()
                .map(|i| OrderItem { name: i.name.clone(), sku: i.sku.clone(), units: i.quantity, selling_price: i.unit_price })
                .collect(),
            payment_method: match record.payment_method {
                PaymentMethod::Cod => "COD",
                PaymentMethod::Prepaid => "Prepaid",
            },
            shipping_charges: record.shipping_fee,
            total_discount: record.discount,
            // net of discount; the provider adds shipping_charges on top
            sub_total: record.subtotal - record.discount,
            length: package.length,
            breadth: package.breadth,
            height: package.height,
            weight: package.weight,
        }
    }
}

fn split_name(full: &str) -> (String, String) {
    let full = full.trim();
    match full.rsplit_once(' ') {
        Some((first, last)) => (first.trim().to_string(), last.trim().to_string()),
        None => (full.to_string(), String::new()),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub shipment_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignAwbRequest {
    pub shipment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courier_id: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignAwbResponse {
    #[serde(default)]
    pub awb_assign_status: i32,
    #[serde(default)]
    pub response: Option<AwbResponseBody>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AwbResponseBody {
    pub data: AwbData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AwbData {
    pub awb_code: String,
    #[serde(default)]
    pub courier_name: Option<String>,
}

/// Booked shipment identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AwbAssignment {
    pub awb_code: String,
    pub courier_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackResponse {
    pub tracking_data: TrackingData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingData {
    #[serde(default)]
    pub shipment_track: Vec<ShipmentTrack>,
    #[serde(default)]
    pub shipment_track_activities: Option<Vec<TrackingActivity>>,
    #[serde(default)]
    pub track_url: Option<String>,
    #[serde(default)]
    pub etd: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShipmentTrack {
    #[serde(default)]
    pub current_status: Option<String>,
    #[serde(default)]
    pub courier_name: Option<String>,
    #[serde(default)]
    pub delivered_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TrackingActivity {
    pub date: String,
    #[serde(default, rename = "sr-status-label")]
    pub status: Option<String>,
    pub activity: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// Tracking view returned to shoppers and staff.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TrackingSummary {
    pub awb_code: String,
    pub current_status: Option<String>,
    pub courier_name: Option<String>,
    pub delivered_date: Option<String>,
    pub estimated_delivery: Option<String>,
    pub track_url: Option<String>,
    pub activities: Vec<TrackingActivity>,
}

impl TrackingSummary {
    pub fn from_response(awb_code: &str, data: TrackingData) -> Self {
        let latest = data.shipment_track.into_iter().next();
        Self {
            awb_code: awb_code.to_string(),
            current_status: latest.as_ref().and_then(|t| t.current_status.clone()),
            courier_name: latest.as_ref().and_then(|t| t.courier_name.clone()),
            delivered_date: latest.and_then(|t| t.delivered_date),
            estimated_delivery: data.etd,
            track_url: data.track_url,
            activities: data.shipment_track_activities.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(super) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct LoginResponse {
    pub token: String,
}

/// Provider ids arrive as numbers or strings depending on the endpoint.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("Meera Nair"), ("Meera".to_string(), "Nair".to_string()));
        assert_eq!(split_name("Anil Kumar Sharma"), ("Anil Kumar".to_string(), "Sharma".to_string()));
        assert_eq!(split_name("Madhu"), ("Madhu".to_string(), String::new()));
    }

    #[test]
    fn test_create_response_numeric_ids() {
        let r: CreateOrderResponse =
            serde_json::from_str(r#"{"order_id": 281248157, "shipment_id": "280640791", "status": "NEW"}"#).unwrap();
        assert_eq!(r.order_id, "281248157");
        assert_eq!(r.shipment_id, "280640791");
    }

    #[test]
    fn test_package_validity() {
        let mut p = PackageDetails {
            length: Decimal::new(20, 0), breadth: Decimal::new(15, 0), height: Decimal::new(10, 0),
            weight: Decimal::new(5, 1), courier_id: None,
        };
        assert!(p.is_valid());
        p.weight = Decimal::ZERO;
        assert!(!p.is_valid());
    }

    #[test]
    fn test_tracking_summary() {
        let data: TrackingData = serde_json::from_value(serde_json::json!({
            "track_status": 1,
            "shipment_track": [{"current_status": "In Transit", "courier_name": "Delhivery"}],
            "shipment_track_activities": [
                {"date": "2026-10-16 18:40:00", "sr-status-label": "IN TRANSIT", "activity": "Bag received", "location": "Bhiwandi"}
            ],
            "track_url": "https://track.example/AWB1",
            "etd": "2026-10-19 23:59:00"
        })).unwrap();
        let summary = TrackingSummary::from_response("AWB1", data);
        assert_eq!(summary.current_status.as_deref(), Some("In Transit"));
        assert_eq!(summary.activities.len(), 1);
        assert_eq!(summary.activities[0].status.as_deref(), Some("IN TRANSIT"));
        assert_eq!(summary.estimated_delivery.as_deref(), Some("2026-10-19 23:59:00"));
    }
}
