use std::fs;
use toml::Value;

fn main() {
    let layout_config = "../build-config/blockmap.toml";
    println!("cargo::rerun-if-changed={}", layout_config);

    let layout_content = fs::read_to_string(layout_config).unwrap();
    let layout_value: Value = toml::from_str(&layout_content).unwrap();

    for (key, value) in layout_value.as_table().unwrap() {
        println!("cargo::rustc-env={}={}", key, value);
    }
}
