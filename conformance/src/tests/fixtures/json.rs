//! JSON payloads.

/// `GET People(1)` in V4 minimal metadata.
pub const JSON_PERSON_V4: &str = r#"{
  "@odata.context": "http://host/svc.svc/$metadata#People/$entity",
  "@odata.etag": "W/\"'Ann'\"",
  "Id": 1,
  "Name": "Ann"
}"#;

/// `GET People(1)` without the non-nullable `Name`.
pub const JSON_PERSON_MISSING_NAME_V4: &str = r#"{"Id":1}"#;

/// `GET People(1)` carrying the undeclared `Nickname`.
pub const JSON_PERSON_UNDECLARED_V4: &str = r#"{
  "@odata.context": "http://host/svc.svc/$metadata#People/$entity",
  "Id": 1,
  "Name": "Ann",
  "Nickname": "Annie"
}"#;

/// `GET People(1)?$expand=Friends,BestFriend`.
pub const JSON_PERSON_EXPANDED_V4: &str = r#"{
  "@odata.context": "http://host/svc.svc/$metadata#People(Friends,BestFriend)/$entity",
  "Id": 1,
  "Name": "Ann",
  "Friends": [
    {"Id": 2, "Name": "Bob"},
    {"Id": 3, "Name": "Cy"}
  ],
  "BestFriend": {"Id": 2, "Name": "Bob"}
}"#;

/// `GET People` in V4 minimal metadata.
pub const JSON_FEED_PEOPLE_V4: &str = r##"{
  "@odata.context": "http://host/svc.svc/$metadata#People",
  "value": [
    {"@odata.id": "http://host/svc.svc/People(1)", "Id": 1, "Name": "Ann"},
    {"@odata.type": "#Demo.Employee", "Id": 3, "Name": "Cy", "Salary": 10}
  ]
}"##;

/// `GET People(1)` in V2 verbose JSON.
pub const JSON_PERSON_VERBOSE_V2: &str = r#"{
  "d": {
    "__metadata": {
      "uri": "http://host/svc.svc/People(1)",
      "type": "Demo.Person",
      "etag": "W/\"'Ann'\""
    },
    "Id": 1,
    "Name": "Ann",
    "Age": null,
    "Friends": {"__deferred": {"uri": "http://host/svc.svc/People(1)/Friends"}},
    "BestFriend": {"__deferred": {"uri": "http://host/svc.svc/People(1)/BestFriend"}}
  }
}"#;

/// `GET /` in V4 JSON.
pub const JSON_SERVICE_DOCUMENT_V4: &str = r#"{
  "@odata.context": "http://host/svc.svc/$metadata",
  "value": [
    {"name": "People", "kind": "EntitySet", "url": "People"},
    {"name": "Photos", "kind": "EntitySet", "url": "Photos"},
    {"name": "Me", "kind": "Singleton", "url": "Me"}
  ]
}"#;

/// `GET People(1)/Friends/$ref` in V4 JSON.
pub const JSON_REF_COLLECTION_V4: &str = r#"{
  "@odata.context": "http://host/svc.svc/$metadata#Collection($ref)",
  "value": [
    {"@odata.id": "http://host/svc.svc/People(2)"},
    {"@odata.id": "http://host/svc.svc/People(3)"}
  ]
}"#;

/// V4 JSON error.
pub const JSON_ERROR_V4: &str = r#"{
  "error": {
    "code": "NotFound",
    "message": "Resource not found for the segment 'Peeple'.",
    "target": "Peeple"
  }
}"#;

/// V4 JSON error whose `message` is a V3-style object.
pub const JSON_ERROR_V4_BAD: &str = r#"{
  "error": {
    "code": "NotFound",
    "message": {"lang": "en-US", "value": "Resource not found."}
  }
}"#;

/// V3 JSON light error.
pub const JSON_ERROR_V3: &str = r#"{
  "odata.error": {
    "code": "",
    "message": {"lang": "en-US", "value": "Resource not found."}
  }
}"#;
