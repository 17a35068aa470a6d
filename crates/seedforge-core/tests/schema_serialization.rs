use seedforge_core::{DataModel, Field, Model, ParentField, ScalarField};

#[test]
fn serializes_data_model_deterministically() {
    let data_model = DataModel::new([Model::new("Tag").with_field(ScalarField::id("id"))]);

    let json = serde_json::to_string_pretty(&data_model).expect("serialize data model");
    let expected = r#"{
  "models": {
    "Tag": {
      "name": "Tag",
      "fields": [
        {
          "kind": "scalar",
          "name": "id",
          "is_id": true,
          "is_generated": false,
          "has_default_value": false,
          "sequence": false
        }
      ],
      "unique_constraints": []
    }
  }
}"#;
    assert_eq!(json, expected);
}

#[test]
fn decodes_relations_from_json() {
    let json = r#"{
      "models": {
        "Post": {
          "name": "Post",
          "fields": [
            {"kind": "scalar", "name": "id", "is_id": true},
            {"kind": "scalar", "name": "authorId"},
            {
              "kind": "parent",
              "name": "author",
              "target": "User",
              "from_fields": ["authorId"],
              "to_fields": ["id"],
              "is_required": true,
              "relation_name": "PostToUser"
            }
          ],
          "unique_constraints": [{"fields": ["authorId", "id"]}]
        }
      }
    }"#;

    let data_model = DataModel::from_json_str(json).expect("decode data model");
    let post = data_model.model("Post").expect("post model");
    let grouped = post.grouped();
    assert_eq!(grouped.scalars.len(), 2);
    assert_eq!(grouped.parents.len(), 1);

    let Some(Field::Parent(author)) = post.field("author") else {
        panic!("author should be a parent field");
    };
    let pairs: Vec<_> = author.column_pairs().collect();
    assert_eq!(pairs, vec![("authorId", "id")]);
    assert_eq!(post.unique_constraints[0].label(), "authorId_id");
}

#[test]
fn builder_marks_parent_required_by_default() {
    let parent = ParentField::new("owner", "User", "OwnerRel").columns("ownerId", "id");
    assert!(parent.is_required);
    assert!(!parent.optional().is_required);
}
