use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::filter::{ColumnKind, ColumnSpec, SqlValue, TableSpec, UpdatableField};

pub static BUSINESSES: TableSpec = TableSpec {
    name: "businesses",
    columns: &[
        ColumnSpec::new("id", ColumnKind::Uuid),
        ColumnSpec::new("name", ColumnKind::Text),
        ColumnSpec::new("category", ColumnKind::Text),
        ColumnSpec::new("description", ColumnKind::Text),
        ColumnSpec::new("contact_information", ColumnKind::Text),
        ColumnSpec::new("latitude", ColumnKind::Float),
        ColumnSpec::new("longitude", ColumnKind::Float),
        ColumnSpec::new("attachments", ColumnKind::TextArray),
        ColumnSpec::new("created_by", ColumnKind::Uuid),
        ColumnSpec::new("created_at", ColumnKind::Timestamp),
        ColumnSpec::new("updated_at", ColumnKind::Timestamp),
        ColumnSpec::new("deleted_at", ColumnKind::Timestamp),
    ],
};

text_enum! {
    BusinessCategory {
        Restaurant => "Restaurant",
        Retail => "Retail",
        Service => "Service",
        Healthcare => "Healthcare",
        Entertainment => "Entertainment",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    pub category: BusinessCategory,
    pub description: String,
    pub contact_information: String,
    #[sqlx(flatten)]
    pub location: Location,
    pub attachments: Vec<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewBusiness {
    pub name: String,
    pub category: BusinessCategory,
    pub description: String,
    pub contact_information: String,
    pub location: Location,
    pub attachments: Vec<String>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessUpdate {
    pub id: Uuid,
    pub name: Option<String>,
    pub category: Option<BusinessCategory>,
    pub description: Option<String>,
    pub contact_information: Option<String>,
    pub location: Option<Location>,
    pub attachments: Option<Vec<String>>,
}

impl BusinessUpdate {
    pub fn normalized(mut self) -> Self {
        self.name = super::non_empty(self.name);
        self.description = super::non_empty(self.description);
        self.contact_information = super::non_empty(self.contact_information);
        self.attachments = self.attachments.filter(|a| !a.is_empty());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessList {
    pub businesses: Vec<Business>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "column", content = "value", rename_all = "snake_case")]
pub enum BusinessField {
    Name(String),
    Category(BusinessCategory),
    Description(String),
    ContactInformation(String),
    Attachments(Vec<String>),
}

impl UpdatableField for BusinessField {
    fn column(&self) -> &'static str {
        match self {
            BusinessField::Name(_) => "name",
            BusinessField::Category(_) => "category",
            BusinessField::Description(_) => "description",
            BusinessField::ContactInformation(_) => "contact_information",
            BusinessField::Attachments(_) => "attachments",
        }
    }

    fn to_value(&self) -> SqlValue {
        match self {
            BusinessField::Name(v) | BusinessField::Description(v) | BusinessField::ContactInformation(v) => {
                SqlValue::Text(v.clone())
            }
            BusinessField::Category(v) => (*v).into(),
            BusinessField::Attachments(v) => SqlValue::TextArray(v.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_text() {
        for category in BusinessCategory::ALL {
            assert_eq!(category.as_str().parse::<BusinessCategory>().unwrap(), *category);
        }
        assert!("Bakery".parse::<BusinessCategory>().is_err());
    }

    #[test]
    fn location_bounds() {
        assert!(Location { latitude: 41.3, longitude: 69.2 }.is_valid());
        assert!(!Location { latitude: 91.0, longitude: 0.0 }.is_valid());
    }

    #[test]
    fn business_serializes_nested_location() {
        let business = Business {
            id: Uuid::nil(),
            name: "Cafe".into(),
            category: BusinessCategory::Restaurant,
            description: String::new(),
            contact_information: String::new(),
            location: Location { latitude: 1.0, longitude: 2.0 },
            attachments: vec![],
            created_by: Uuid::nil(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        let json = serde_json::to_value(&business).unwrap();
        assert_eq!(json["location"]["longitude"], 2.0);
        assert_eq!(json["category"], "Restaurant");
    }

    #[test]
    fn attachments_field_binds_array() {
        let field: BusinessField =
            serde_json::from_str(r#"{"column":"attachments","value":["a.png","b.png"]}"#).unwrap();
        assert_eq!(field.to_value(), SqlValue::TextArray(vec!["a.png".into(), "b.png".into()]));
    }
}
