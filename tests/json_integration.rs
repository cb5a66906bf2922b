use std::{
    env::temp_dir,
    fs::{self, read_to_string},
    path::{Path, PathBuf},
};

use rand::distr::{Alphanumeric, SampleString};
use serde::Deserialize;
use serde_json::{json, Value};
use tabutils::{
    core::{
        item::{iter, ItemReader, Record},
        step::StepBuilder,
    },
    item::json::{json_reader::JsonItemReaderBuilder, json_writer::JsonItemWriterBuilder},
};

fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

#[derive(Debug, Deserialize, PartialEq)]
struct Pair {
    a: i64,
    b: i64,
}

#[test]
fn newline_json_keeps_numbers() {
    let reader = JsonItemReaderBuilder::<Record>::new()
        .newline(true)
        .from_path(data("newline.json"))
        .unwrap();

    let first = reader.read().unwrap().unwrap();
    assert_eq!(Value::Object(first), json!({"a": 2, "b": 3}));
    assert_eq!(iter(&reader).count(), 2);
}

#[test]
fn newline_json_into_typed_items() {
    let reader = JsonItemReaderBuilder::<Pair>::new()
        .newline(true)
        .from_path(data("newline.json"))
        .unwrap();

    let pairs: Vec<Pair> = iter(&reader).map(Result::unwrap).collect();
    assert_eq!(
        pairs,
        vec![Pair { a: 2, b: 3 }, Pair { a: 4, b: 5 }, Pair { a: 6, b: 7 }]
    );
}

#[test]
fn newline_json_to_array_and_back() {
    let file_name = Alphanumeric.sample_string(&mut rand::rng(), 16);
    let output_path = temp_dir().join(format!("output_{}.json", file_name));

    let reader = JsonItemReaderBuilder::<Record>::new()
        .newline(true)
        .from_path(data("newline.json"))
        .unwrap();
    let writer = JsonItemWriterBuilder::new()
        .pretty_formatter(true)
        .from_path(&output_path)
        .unwrap();

    let step = StepBuilder::new()
        .reader(&reader)
        .writer(&writer)
        .chunk(2)
        .build()
        .unwrap();
    let result = step.execute().unwrap();
    assert_eq!(result.write_count, 3);

    let written: Value = serde_json::from_str(&read_to_string(&output_path).unwrap()).unwrap();
    assert_eq!(written, json!([{"a": 2, "b": 3}, {"a": 4, "b": 5}, {"a": 6, "b": 7}]));

    let back = JsonItemReaderBuilder::<Pair>::new()
        .capacity(16)
        .from_path(&output_path)
        .unwrap();
    assert_eq!(iter(&back).filter(Result::is_ok).count(), 3);

    fs::remove_file(&output_path).ok();
}

#[test]
fn utf16_json_is_decoded_first() {
    let text = "[{\"name\": \"Ādam\"}, {\"name\": \"Iñtërnâtiônàližætiøn\"}]";
    let mut bytes = vec![0xFF, 0xFE];
    bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes));

    let reader = JsonItemReaderBuilder::<Record>::new()
        .from_reader(bytes.as_slice())
        .unwrap();

    let names: Vec<Value> = iter(&reader).map(|r| r.unwrap()["name"].clone()).collect();
    assert_eq!(names, vec![json!("Ādam"), json!("Iñtërnâtiônàližætiøn")]);
}
