use crate::proto;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// An order is the list of item names, in the order they were entered.
pub type Order = Vec<String>;

/// Canonical form of a postcode used as the order book key: all whitespace
/// removed and lowercased, so `"DH1 3LE"` and `"dh13le"` are the same bucket.
pub fn normalize(postcode: &str) -> String {
    postcode
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether `postcode` has the shape of a UK postcode: one or two letters, a
/// digit, an optional letter or digit, then a digit and two letters. Spaces
/// and case are ignored. Says nothing about whether the postcode exists.
pub fn looks_like_postcode(postcode: &str) -> bool {
    let chars: Vec<char> = normalize(postcode).chars().collect();
    if !(5..=7).contains(&chars.len()) {
        return false;
    }
    let (outward, inward) = chars.split_at(chars.len() - 3);
    let inward_ok =
        inward[0].is_ascii_digit() && inward[1..].iter().all(char::is_ascii_lowercase);

    let area = outward.iter().take_while(|c| c.is_ascii_lowercase()).count();
    let district = &outward[area.min(outward.len())..];
    let outward_ok = (1..=2).contains(&area)
        && matches!(district.first(), Some(c) if c.is_ascii_digit())
        && district.len() <= 2
        && district.iter().all(char::is_ascii_alphanumeric);

    inward_ok && outward_ok
}

/// Every order a replica knows about, grouped by normalised postcode.
///
/// Buckets only ever grow through [`OrderBook::append`]. A whole book can be
/// replaced by a snapshot from the primary but is never merged with one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderBook {
    buckets: BTreeMap<String, Vec<Order>>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a book from `{postcode: [[item, ...], ...]}` JSON. Keys are
    /// normalised, buckets whose keys collapse to the same postcode are
    /// concatenated in key order.
    pub fn from_json(raw: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<Order>> = serde_json::from_str(raw)?;
        let mut book = OrderBook::new();
        for (postcode, orders) in raw {
            book.buckets
                .entry(normalize(&postcode))
                .or_default()
                .extend(orders);
        }
        Ok(book)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Sample data a freshly started replica can be seeded with.
    pub fn demo() -> Self {
        let mut book = OrderBook::new();
        book.append("dh13le", vec!["burger".into(), "fries".into()]);
        book.append("dh13le", vec!["pizza".into()]);
        book.append("dh13lg", vec!["fried chicken".into(), "chips".into()]);
        book.append("dh13lg", vec!["vegetables".into()]);
        book
    }

    /// Append an order and return its 1-based position within the bucket.
    pub fn append(&mut self, postcode: &str, items: Order) -> usize {
        let bucket = self.buckets.entry(normalize(postcode)).or_default();
        bucket.push(items);
        bucket.len()
    }

    pub fn orders(&self, postcode: &str) -> &[Order] {
        self.buckets
            .get(&normalize(postcode))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of postcodes that have received at least one order.
    pub fn postcodes(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn to_snapshot(&self) -> proto::Snapshot {
        proto::Snapshot {
            buckets: self
                .buckets
                .iter()
                .map(|(postcode, orders)| {
                    let orders = orders
                        .iter()
                        .map(|items| proto::Order {
                            items: items.clone(),
                        })
                        .collect();
                    (postcode.clone(), proto::OrderList { orders })
                })
                .collect(),
        }
    }
}

impl From<proto::Snapshot> for OrderBook {
    fn from(snapshot: proto::Snapshot) -> Self {
        let buckets = snapshot
            .buckets
            .into_iter()
            .map(|(postcode, list)| {
                let orders = list.orders.into_iter().map(|o| o.items).collect();
                (postcode, orders)
            })
            .collect();
        OrderBook { buckets }
    }
}

/// Reply to a `placeOrder` call: `ok` with the confirmation `#N`, or the
/// reason the order was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderOutcome {
    pub ok: bool,
    pub detail: String,
}

impl OrderOutcome {
    pub fn confirmed(position: usize) -> Self {
        OrderOutcome {
            ok: true,
            detail: format!("#{position}"),
        }
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        OrderOutcome {
            ok: false,
            detail: detail.into(),
        }
    }
}

impl From<proto::PlaceOrderReply> for OrderOutcome {
    fn from(reply: proto::PlaceOrderReply) -> Self {
        OrderOutcome {
            ok: reply.ok,
            detail: reply.detail,
        }
    }
}

impl From<OrderOutcome> for proto::PlaceOrderReply {
    fn from(outcome: OrderOutcome) -> Self {
        proto::PlaceOrderReply {
            ok: outcome.ok,
            detail: outcome.detail,
        }
    }
}

/// Reply to a `getOrders` call. `detail` explains an empty listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderListing {
    pub orders: Vec<Order>,
    pub detail: String,
}

impl OrderListing {
    pub fn empty(detail: impl Into<String>) -> Self {
        OrderListing {
            orders: Vec::new(),
            detail: detail.into(),
        }
    }
}

impl From<proto::GetOrdersReply> for OrderListing {
    fn from(reply: proto::GetOrdersReply) -> Self {
        OrderListing {
            orders: reply.orders.into_iter().map(|o| o.items).collect(),
            detail: reply.detail,
        }
    }
}

impl From<OrderListing> for proto::GetOrdersReply {
    fn from(listing: OrderListing) -> Self {
        proto::GetOrdersReply {
            orders: listing
                .orders
                .into_iter()
                .map(|items| proto::Order { items })
                .collect(),
            detail: listing.detail,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalize_strips_whitespace_and_case() {
        assert_eq!(normalize("DH1 3LE"), "dh13le");
        assert_eq!(normalize("  dh1\t3le "), "dh13le");
        assert_eq!(normalize("dh13le"), "dh13le");
    }

    #[test]
    fn postcode_shapes() {
        for postcode in ["DH1 3LE", "dh13lg", "SW1A 1AA", "m1 1ae", "EC1A1BB", "W1A 0AX"] {
            assert!(looks_like_postcode(postcode), "{postcode}");
        }
        for postcode in ["", "pizza", "DH1", "123 456", "DH1 3L", "ABC1 1AA", "DH1 3LEX"] {
            assert!(!looks_like_postcode(postcode), "{postcode}");
        }
    }

    #[test]
    fn append_returns_position_in_bucket() {
        let mut book = OrderBook::demo();
        assert_eq!(book.append("DH1 3LE", vec!["fried rice".into()]), 3);
        assert_eq!(book.append("ZZ9 9ZZ", vec!["soup".into()]), 1);
        assert_eq!(
            book.orders("dh13le"),
            &[
                vec!["burger".to_string(), "fries".to_string()],
                vec!["pizza".to_string()],
                vec!["fried rice".to_string()],
            ]
        );
    }

    #[test]
    fn unknown_postcode_has_no_orders() {
        let book = OrderBook::demo();
        assert!(book.orders("sw1a1aa").is_empty());
        assert_eq!(book.postcodes(), 2);
    }

    #[test]
    fn snapshot_preserves_order_within_bucket() {
        let book = OrderBook::demo();
        let restored = OrderBook::from(book.to_snapshot());
        assert_eq!(restored, book);
        assert_eq!(restored.orders("dh13lg")[1], vec!["vegetables".to_string()]);
    }

    #[test]
    fn seed_json_keys_are_normalized() {
        let book = OrderBook::from_json(
            r#"{"DH1 3LE": [["burger", "fries"]], "dh13le": [["pizza"]]}"#,
        )
        .unwrap();
        assert_eq!(book.postcodes(), 1);
        assert_eq!(book.orders("dh13le").len(), 2);
    }

    #[test]
    fn malformed_seed_is_rejected() {
        assert!(OrderBook::from_json(r#"{"dh13le": "pizza"}"#).is_err());
    }

    #[test]
    fn seed_file_loads() {
        let temp_dir = tempfile::TempDir::new().expect("unable to create temporary directory");
        let path = temp_dir.path().join("orders.json");
        std::fs::write(&path, r#"{"DH1 3LG": [["chips"], ["curry", "rice"]]}"#).unwrap();

        let book = OrderBook::load(&path).unwrap();
        assert_eq!(book.orders("dh13lg")[1], vec!["curry".to_string(), "rice".to_string()]);

        assert!(matches!(
            OrderBook::load(temp_dir.path().join("missing.json")),
            Err(crate::Error::Io(_))
        ));
    }
}
