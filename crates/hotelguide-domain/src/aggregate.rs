use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One contact row as read from the hotel service's store: the location it
/// belongs to and the hotel that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    pub location: String,
    pub hotel_id: Uuid,
}

/// Per-location statistics computed from one consistent read of the contact
/// data. `hotel_count` counts distinct hotels, not contacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateItem {
    pub location: String,
    pub hotel_count: u32,
    pub contact_count: u32,
}

/// Group contacts by location in first-seen order. Ordering carries no
/// meaning but must be stable so round trips are reproducible.
pub fn aggregate_contacts(contacts: &[ContactRecord]) -> Vec<AggregateItem> {
    let mut order: Vec<&str> = Vec::new();
    let mut hotels: HashMap<&str, Vec<Uuid>> = HashMap::new();
    let mut contact_counts: HashMap<&str, u32> = HashMap::new();

    for contact in contacts {
        let location = contact.location.as_str();
        let seen = hotels.entry(location).or_insert_with(|| {
            order.push(location);
            Vec::new()
        });
        if !seen.contains(&contact.hotel_id) {
            seen.push(contact.hotel_id);
        }
        *contact_counts.entry(location).or_insert(0) += 1;
    }

    order
        .into_iter()
        .map(|location| AggregateItem {
            location: location.to_string(),
            hotel_count: hotels[location].len() as u32,
            contact_count: contact_counts[location],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(location: &str, hotel_id: Uuid) -> ContactRecord {
        ContactRecord {
            location: location.to_string(),
            hotel_id,
        }
    }

    #[test]
    fn empty_input_yields_empty_snapshot() {
        assert!(aggregate_contacts(&[]).is_empty());
    }

    #[test]
    fn groups_strictly_by_location() {
        let h1 = Uuid::new_v4();
        let h2 = Uuid::new_v4();
        let contacts = vec![
            contact("Istanbul", h1),
            contact("Ankara", h2),
            contact("Istanbul", h2),
        ];

        let snapshot = aggregate_contacts(&contacts);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].location, "Istanbul");
        assert_eq!(snapshot[1].location, "Ankara");
    }

    #[test]
    fn hotel_count_is_distinct_hotels_not_contacts() {
        // One hotel with three contacts at the same location: the counts
        // must differ.
        let hotel = Uuid::new_v4();
        let other = Uuid::new_v4();
        let contacts = vec![
            contact("Istanbul", hotel),
            contact("Istanbul", hotel),
            contact("Istanbul", hotel),
            contact("Istanbul", other),
        ];

        let snapshot = aggregate_contacts(&contacts);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].hotel_count, 2);
        assert_eq!(snapshot[0].contact_count, 4);
    }

    #[test]
    fn order_follows_first_seen_location() {
        let hotel = Uuid::new_v4();
        let contacts = vec![
            contact("Izmir", hotel),
            contact("Ankara", hotel),
            contact("Izmir", hotel),
            contact("Bursa", hotel),
        ];

        let snapshot = aggregate_contacts(&contacts);
        let locations: Vec<&str> = snapshot.iter().map(|i| i.location.as_str()).collect();

        assert_eq!(locations, vec!["Izmir", "Ankara", "Bursa"]);
    }

    #[test]
    fn aggregate_item_uses_camel_case_on_the_wire() {
        let item = AggregateItem {
            location: "Istanbul".to_string(),
            hotel_count: 3,
            contact_count: 5,
        };

        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "location": "Istanbul",
                "hotelCount": 3,
                "contactCount": 5,
            })
        );
    }
}
