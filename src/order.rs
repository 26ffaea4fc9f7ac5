//! Order boundary schema.
//!
//! The PHP endpoints return loosely shaped JSON: French column names, camelCase
//! variants from the storefront front-ends, numbers as strings, nested or flat
//! customer/delivery data. [`Order::from_value`] normalises all of it once so
//! the renderer only ever sees a fully resolved [`Order`]:
//!
//! - every amount and quantity is a finite `f64` (unparseable values become 0
//!   and are listed in [`Order::coerced_fields`]),
//! - every delivery field falls back to the customer field, then to `""`,
//! - a missing `total_order` is derived as `subtotal + shipping - discount`.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{InvoiceError, Result};

const ORDER_NUMBER_KEYS: &[&str] = &[
    "numero_commande",
    "orderNumber",
    "order_number",
    "num_commande",
    "reference",
];
const ORDER_ID_KEYS: &[&str] = &["id", "id_commande", "order_id", "orderId"];
const ORDER_DATE_KEYS: &[&str] = &[
    "date_commande",
    "orderDate",
    "order_date",
    "created_at",
    "createdAt",
    "date",
];
const STATUS_KEYS: &[&str] = &["statut", "status", "etat"];
const PAYMENT_KEYS: &[&str] = &[
    "mode_paiement",
    "payment_method",
    "paymentMethod",
    "methode_paiement",
];
const NOTES_KEYS: &[&str] = &["notes", "note", "commentaire", "remarques"];

const CUSTOMER_OBJECT_KEYS: &[&str] = &["customer", "client"];
const DELIVERY_OBJECT_KEYS: &[&str] = &[
    "deliveryAddress",
    "delivery_address",
    "delivery",
    "livraison",
    "shipping_address",
    "adresse_livraison",
];
const FINANCIALS_OBJECT_KEYS: &[&str] = &["financials", "totaux", "totals"];
const ITEMS_KEYS: &[&str] = &["items", "articles", "produits", "order_items", "lignes"];

const FULL_NAME_KEYS: &[&str] = &["name", "nom_complet", "full_name", "fullName"];
const FIRST_NAME_KEYS: &[&str] = &["prenom", "first_name", "firstName"];
const LAST_NAME_KEYS: &[&str] = &["nom", "last_name", "lastName"];
const EMAIL_KEYS: &[&str] = &["email", "mail"];
const PHONE_KEYS: &[&str] = &["phone", "telephone", "tel", "mobile"];
const ADDRESS_KEYS: &[&str] = &["address", "adresse", "street", "rue"];
const CITY_KEYS: &[&str] = &["city", "ville"];
const POSTAL_CODE_KEYS: &[&str] = &["postalCode", "postal_code", "code_postal", "zip"];
const COUNTRY_KEYS: &[&str] = &["country", "pays"];

const FLAT_CUSTOMER_NAME_KEYS: &[&str] = &["nom_client", "customer_name", "client_name"];
const FLAT_CUSTOMER_EMAIL_KEYS: &[&str] = &["email", "email_client", "customer_email"];
const FLAT_CUSTOMER_PHONE_KEYS: &[&str] = &[
    "telephone",
    "phone",
    "tel",
    "telephone_client",
    "customer_phone",
];
const FLAT_CUSTOMER_ADDRESS_KEYS: &[&str] = &[
    "adresse",
    "address",
    "adresse_client",
    "customer_address",
];
const FLAT_CUSTOMER_CITY_KEYS: &[&str] = &["ville", "city", "ville_client", "customer_city"];
const FLAT_CUSTOMER_POSTAL_KEYS: &[&str] = &[
    "code_postal",
    "postal_code",
    "postalCode",
    "zip",
    "customer_postal_code",
];
const FLAT_CUSTOMER_COUNTRY_KEYS: &[&str] = &["pays", "country", "customer_country"];

const FLAT_DELIVERY_NAME_KEYS: &[&str] = &["nom_livraison", "delivery_name", "shipping_name"];
const FLAT_DELIVERY_PHONE_KEYS: &[&str] = &[
    "telephone_livraison",
    "delivery_phone",
    "shipping_phone",
];
const FLAT_DELIVERY_ADDRESS_KEYS: &[&str] = &[
    "adresse_livraison",
    "delivery_address",
    "delivery_street",
    "shipping_street",
];
const FLAT_DELIVERY_CITY_KEYS: &[&str] = &["ville_livraison", "delivery_city", "shipping_city"];
const FLAT_DELIVERY_POSTAL_KEYS: &[&str] = &[
    "code_postal_livraison",
    "delivery_postal_code",
    "shipping_postal_code",
];
const FLAT_DELIVERY_COUNTRY_KEYS: &[&str] = &[
    "pays_livraison",
    "delivery_country",
    "shipping_country",
];

const ITEM_NAME_KEYS: &[&str] = &[
    "nom_produit",
    "name",
    "product_name",
    "productName",
    "nom",
    "titre",
    "title",
    "libelle",
];
const ITEM_REFERENCE_KEYS: &[&str] = &[
    "reference",
    "ref",
    "sku",
    "code",
    "product_id",
    "id_produit",
];
const ITEM_SIZE_KEYS: &[&str] = &["taille", "size", "pointure"];
const ITEM_COLOR_KEYS: &[&str] = &["couleur", "color", "colour"];
const ITEM_QUANTITY_KEYS: &[&str] = &["quantite", "quantity", "qty", "qte"];
const ITEM_UNIT_PRICE_KEYS: &[&str] = &[
    "prix_unitaire",
    "unitPrice",
    "unit_price",
    "prix",
    "price",
];
const ITEM_LINE_TOTAL_KEYS: &[&str] = &[
    "total_ligne",
    "lineTotal",
    "line_total",
    "total_price",
    "totalPrice",
    "total",
];

const SUBTOTAL_KEYS: &[&str] = &[
    "sous_total",
    "subtotal",
    "subTotal",
    "montant_ht",
    "total_produits",
];
const DISCOUNT_KEYS: &[&str] = &[
    "remise",
    "discount",
    "reduction",
    "montant_remise",
    "discount_amount",
];
const SHIPPING_KEYS: &[&str] = &[
    "frais_livraison",
    "shipping",
    "shipping_cost",
    "shippingCost",
    "delivery_fee",
];
// A bare `total` counts only inside a financials object.
const TOTAL_KEYS: &[&str] = &["total_order", "montant_total", "totalAmount", "total_amount"];
const NESTED_TOTAL_KEYS: &[&str] = &[
    "total_order",
    "total",
    "montant_total",
    "totalAmount",
    "total_amount",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryInfo {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineItem {
    pub name: String,
    pub reference: String,
    pub size: String,
    pub color: String,
    pub quantity: f64,
    pub unit_price: f64,
    /// Line total as sent by the backend, when it sent a usable one.
    pub supplied_line_total: Option<f64>,
}

impl LineItem {
    pub fn line_total(&self) -> f64 {
        self.supplied_line_total
            .unwrap_or(self.unit_price * self.quantity)
    }

    /// `size / color`, each missing part shown as `-`.
    pub fn size_color(&self) -> String {
        let part = |value: &str| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                "-".to_string()
            } else {
                trimmed.to_string()
            }
        };
        format!("{} / {}", part(&self.size), part(&self.color))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Financials {
    pub subtotal: f64,
    pub discount: f64,
    pub shipping: f64,
    pub supplied_total: Option<f64>,
    /// False when the backend sent no usable subtotal (it then reads as 0).
    pub subtotal_supplied: bool,
}

impl Financials {
    pub fn derived_total(&self) -> f64 {
        self.subtotal + self.shipping - self.discount
    }

    pub fn total(&self) -> f64 {
        self.supplied_total.unwrap_or_else(|| self.derived_total())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Order {
    pub order_id: Option<String>,
    pub order_number: String,
    /// Raw date as sent; localized at render time.
    pub order_date: String,
    pub customer: CustomerInfo,
    pub delivery: DeliveryInfo,
    pub items: Vec<LineItem>,
    pub financials: Financials,
    pub status: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    /// Paths of numeric fields that were present but unparseable.
    pub coerced_fields: Vec<String>,
}

impl Order {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value)
    }

    pub fn from_value(payload: &Value) -> Result<Self> {
        if !payload.is_object() {
            return Err(InvoiceError::InvalidOrder(format!(
                "expected a JSON object, got {}",
                json_kind(payload)
            )));
        }

        let mut coercions = Coercions::default();
        let order_id = text_from_keys(payload, ORDER_ID_KEYS);
        let order_number = text_from_keys(payload, ORDER_NUMBER_KEYS)
            .or_else(|| order_id.clone())
            .unwrap_or_default();
        let customer = parse_customer(payload);
        let delivery = parse_delivery(payload, &customer);
        let items = parse_items(payload, &mut coercions);
        let financials = parse_financials(payload, &mut coercions);

        let order = Order {
            order_id,
            order_number,
            order_date: text_from_keys(payload, ORDER_DATE_KEYS).unwrap_or_default(),
            customer,
            delivery,
            items,
            financials,
            status: text_from_keys(payload, STATUS_KEYS),
            payment_method: text_from_keys(payload, PAYMENT_KEYS),
            notes: text_from_keys(payload, NOTES_KEYS),
            coerced_fields: coercions.fields,
        };
        debug!(
            order_number = %order.order_number,
            items = order.items.len(),
            coerced = order.coerced_fields.len(),
            "Order payload normalised"
        );
        Ok(order)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Loose JSON accessors
// ---------------------------------------------------------------------------

/// Parse a JSON number or numeric string (`"12.5"`, `"12,50"`, `"1 200 TND"`).
pub(crate) fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|n| n.is_finite()),
        Value::String(text) => parse_numeric_text(text),
        _ => None,
    }
}

fn parse_numeric_text(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches(|c: char| c.is_alphabetic() || c == '€' || c == '$' || c == '.')
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    normalize_separators(&cleaned)?
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Rewrite `1.234,50` / `1,234.50` / `12,50` into `1234.50`-style text.
///
/// With both marks present the last one is the decimal mark. A single mark
/// seen once is decimal; seen repeatedly it is grouping. Grouping must come
/// in blocks of three digits, otherwise the text is ambiguous and rejected.
fn normalize_separators(text: &str) -> Option<String> {
    let last_dot = text.rfind('.');
    let last_comma = text.rfind(',');
    let (decimal, grouping) = match (last_dot, last_comma) {
        (None, None) => return Some(text.to_string()),
        (Some(dot), Some(comma)) if dot > comma => (Some('.'), Some(',')),
        (Some(_), Some(_)) => (Some(','), Some('.')),
        (Some(_), None) if text.matches('.').count() == 1 => (Some('.'), None),
        (Some(_), None) => (None, Some('.')),
        (None, Some(_)) if text.matches(',').count() == 1 => (Some(','), None),
        (None, Some(_)) => (None, Some(',')),
    };

    let (integer, fraction) = match decimal {
        Some(mark) => {
            if text.matches(mark).count() > 1 {
                return None;
            }
            let (integer, fraction) = text.split_once(mark)?;
            (integer, Some(fraction))
        }
        None => (text, None),
    };

    let mut normalized = String::with_capacity(text.len());
    match grouping {
        Some(mark) if integer.contains(mark) => {
            let mut blocks = integer.split(mark);
            let head = blocks.next()?;
            let head_digits = head.trim_start_matches(['-', '+']);
            if head_digits.is_empty() || head_digits.len() > 3 {
                return None;
            }
            normalized.push_str(head);
            for block in blocks {
                if block.len() != 3 || !block.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                normalized.push_str(block);
            }
        }
        _ => normalized.push_str(integer),
    }
    if let Some(fraction) = fraction {
        if fraction.contains(['.', ',']) {
            return None;
        }
        normalized.push('.');
        normalized.push_str(fraction);
    }
    Some(normalized)
}

/// First key holding a non-null value.
fn value_from_keys<'a, 'k>(value: &'a Value, keys: &[&'k str]) -> Option<(&'k str, &'a Value)> {
    keys.iter().find_map(|key| {
        value
            .get(*key)
            .filter(|found| !found.is_null())
            .map(|found| (*key, found))
    })
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn text_from_keys(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(value_as_text))
}

fn object_from_keys<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| value.get(*key).filter(|found| found.is_object()))
}

fn person_name(value: &Value, full_name_keys: &[&str]) -> Option<String> {
    if let Some(full) = text_from_keys(value, full_name_keys) {
        return Some(full);
    }
    let first = text_from_keys(value, FIRST_NAME_KEYS);
    let last = text_from_keys(value, LAST_NAME_KEYS);
    match (first, last) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

#[derive(Default)]
struct Coercions {
    fields: Vec<String>,
}

impl Coercions {
    /// Present-but-unparseable values are recorded and read as absent.
    fn optional_amount(&mut self, scope: &str, sources: &[&Value], keys: &[&str]) -> Option<f64> {
        let (key, raw) = sources
            .iter()
            .find_map(|source| value_from_keys(source, keys))?;
        match parse_number(raw) {
            Some(number) => Some(number),
            None => {
                let path = if scope.is_empty() {
                    key.to_string()
                } else {
                    format!("{scope}.{key}")
                };
                warn!(field = %path, raw = %raw, "Unparseable numeric field, using default");
                self.fields.push(path);
                None
            }
        }
    }

    fn amount(&mut self, scope: &str, sources: &[&Value], keys: &[&str]) -> f64 {
        self.optional_amount(scope, sources, keys).unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

fn parse_customer(payload: &Value) -> CustomerInfo {
    let nested = object_from_keys(payload, CUSTOMER_OBJECT_KEYS);
    let pick = |nested_keys: &[&str], flat_keys: &[&str]| {
        nested
            .and_then(|obj| text_from_keys(obj, nested_keys))
            .or_else(|| text_from_keys(payload, flat_keys))
            .unwrap_or_default()
    };

    let name = nested
        .and_then(|obj| person_name(obj, FULL_NAME_KEYS))
        .or_else(|| text_from_keys(payload, FLAT_CUSTOMER_NAME_KEYS))
        .or_else(|| person_name(payload, &[]))
        .unwrap_or_default();

    CustomerInfo {
        name,
        email: pick(EMAIL_KEYS, FLAT_CUSTOMER_EMAIL_KEYS),
        phone: pick(PHONE_KEYS, FLAT_CUSTOMER_PHONE_KEYS),
        address: pick(ADDRESS_KEYS, FLAT_CUSTOMER_ADDRESS_KEYS),
        city: pick(CITY_KEYS, FLAT_CUSTOMER_CITY_KEYS),
        postal_code: pick(POSTAL_CODE_KEYS, FLAT_CUSTOMER_POSTAL_KEYS),
        country: pick(COUNTRY_KEYS, FLAT_CUSTOMER_COUNTRY_KEYS),
    }
}

/// Each field resolves delivery -> customer -> empty string.
fn parse_delivery(payload: &Value, customer: &CustomerInfo) -> DeliveryInfo {
    let nested = object_from_keys(payload, DELIVERY_OBJECT_KEYS);
    let pick = |nested_keys: &[&str], flat_keys: &[&str], fallback: &str| {
        nested
            .and_then(|obj| text_from_keys(obj, nested_keys))
            .or_else(|| text_from_keys(payload, flat_keys))
            .unwrap_or_else(|| fallback.to_string())
    };

    let name = nested
        .and_then(|obj| person_name(obj, &["name", "nom", "nom_complet", "full_name", "recipient"]))
        .or_else(|| text_from_keys(payload, FLAT_DELIVERY_NAME_KEYS))
        .unwrap_or_else(|| customer.name.clone());

    DeliveryInfo {
        name,
        phone: pick(PHONE_KEYS, FLAT_DELIVERY_PHONE_KEYS, &customer.phone),
        address: pick(ADDRESS_KEYS, FLAT_DELIVERY_ADDRESS_KEYS, &customer.address),
        city: pick(CITY_KEYS, FLAT_DELIVERY_CITY_KEYS, &customer.city),
        postal_code: pick(
            POSTAL_CODE_KEYS,
            FLAT_DELIVERY_POSTAL_KEYS,
            &customer.postal_code,
        ),
        country: pick(COUNTRY_KEYS, FLAT_DELIVERY_COUNTRY_KEYS, &customer.country),
    }
}

fn parse_items(payload: &Value, coercions: &mut Coercions) -> Vec<LineItem> {
    let Some((key, raw)) = value_from_keys(payload, ITEMS_KEYS) else {
        return Vec::new();
    };
    // Some endpoints return the items column still JSON-encoded.
    let decoded;
    let entries = match raw {
        Value::Array(entries) => entries,
        Value::String(text) => {
            decoded = serde_json::from_str::<Value>(text).unwrap_or(Value::Null);
            match decoded.as_array() {
                Some(entries) => entries,
                None => {
                    warn!(field = %key, "Items field is not a JSON array, rendering no items");
                    return Vec::new();
                }
            }
        }
        _ => {
            warn!(field = %key, "Items field is not an array, rendering no items");
            return Vec::new();
        }
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            if !entry.is_object() {
                warn!(index, "Skipping non-object order item");
                return None;
            }
            let scope = format!("items[{index}]");
            let sources = [entry];
            Some(LineItem {
                name: text_from_keys(entry, ITEM_NAME_KEYS).unwrap_or_default(),
                reference: text_from_keys(entry, ITEM_REFERENCE_KEYS).unwrap_or_default(),
                size: text_from_keys(entry, ITEM_SIZE_KEYS).unwrap_or_default(),
                color: text_from_keys(entry, ITEM_COLOR_KEYS).unwrap_or_default(),
                quantity: coercions.amount(&scope, &sources, ITEM_QUANTITY_KEYS),
                unit_price: coercions.amount(&scope, &sources, ITEM_UNIT_PRICE_KEYS),
                supplied_line_total: coercions.optional_amount(
                    &scope,
                    &sources,
                    ITEM_LINE_TOTAL_KEYS,
                ),
            })
        })
        .collect()
}

fn parse_financials(payload: &Value, coercions: &mut Coercions) -> Financials {
    let nested = object_from_keys(payload, FINANCIALS_OBJECT_KEYS);
    let sources: Vec<&Value> = nested.into_iter().chain(std::iter::once(payload)).collect();

    let subtotal = coercions.optional_amount("", &sources, SUBTOTAL_KEYS);
    Financials {
        subtotal: subtotal.unwrap_or(0.0),
        subtotal_supplied: subtotal.is_some(),
        discount: coercions.amount("", &sources, DISCOUNT_KEYS),
        shipping: coercions.amount("", &sources, SHIPPING_KEYS),
        supplied_total: match nested.filter(|n| value_from_keys(n, NESTED_TOTAL_KEYS).is_some()) {
            Some(nested) => coercions.optional_amount("", &[nested], NESTED_TOTAL_KEYS),
            None => coercions.optional_amount("", &[payload], TOTAL_KEYS),
        },
    }
}
