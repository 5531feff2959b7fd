//! GeoJSON export of resolved records.

use csv_mapper_address_models::{AddressRecord, Bounds, Coordinate};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};

/// Builds a `FeatureCollection` with one point per resolved record.
///
/// Unresolved records are left out. The collection's `bbox` encloses every
/// point and is omitted when there are none.
#[must_use]
pub fn feature_collection(records: &[AddressRecord]) -> FeatureCollection {
    let mut points = Vec::new();
    let features = records
        .iter()
        .filter_map(|record| {
            let coordinate = record.coordinate()?;
            points.push(coordinate);
            Some(point_feature(record, coordinate))
        })
        .collect();

    FeatureCollection {
        bbox: Bounds::enclosing(&points).map(|b| b.to_bbox().to_vec()),
        features,
        foreign_members: None,
    }
}

fn point_feature(record: &AddressRecord, coordinate: Coordinate) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("name".to_string(), record.display_name().into());
    properties.insert("address".to_string(), record.full_address().into());

    Feature {
        bbox: None,
        // GeoJSON positions are longitude first.
        geometry: Some(Geometry::new(Value::Point(vec![
            coordinate.longitude,
            coordinate.latitude,
        ]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(street: &str, lat: f64, lon: f64) -> AddressRecord {
        let mut record = AddressRecord::new("Max", "Muster", street, "60311", "Frankfurt");
        record.resolution.resolve(Coordinate::new(lat, lon));
        record
    }

    #[test]
    fn exports_only_resolved_records() {
        let records = vec![
            resolved("Zeil 1", 50.11, 8.68),
            AddressRecord::new("Eva", "Beispiel", "Nirgendwo 9", "00000", "Irgendwo"),
            resolved("Roemerberg 2", 50.10, 8.69),
        ];

        let collection = feature_collection(&records);
        assert_eq!(collection.features.len(), 2);

        let first = &collection.features[0];
        let Some(Geometry {
            value: Value::Point(position),
            ..
        }) = &first.geometry
        else {
            panic!("expected a point geometry");
        };
        assert_eq!(position, &vec![8.68, 50.11]);

        let properties = first.properties.as_ref().unwrap();
        assert_eq!(properties["name"], "Max Muster");
        assert_eq!(properties["address"], "Zeil 1, 60311 Frankfurt");
    }

    #[test]
    fn bbox_encloses_all_points() {
        let records = vec![resolved("a", 50.0, 8.0), resolved("b", 51.0, 7.5)];
        let collection = feature_collection(&records);
        assert_eq!(collection.bbox, Some(vec![7.5, 50.0, 8.0, 51.0]));
    }

    #[test]
    fn nothing_resolved_gives_empty_collection_without_bbox() {
        let records = vec![AddressRecord::new("a", "b", "c", "d", "e")];
        let collection = feature_collection(&records);
        assert!(collection.features.is_empty());
        assert!(collection.bbox.is_none());
    }

    #[test]
    fn serializes_as_feature_collection() {
        let collection = feature_collection(&[resolved("a", 50.0, 8.0)]);
        let json = serde_json::to_value(&collection).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"][0]["geometry"]["type"], "Point");
    }
}
