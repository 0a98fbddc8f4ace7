// topics.rs

use std::fmt;

use anyhow::{bail, Context};
use one_wire_bus::Address;
use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer,
};

use crate::bus::{parse_rom, rom_hex};

#[derive(Clone, Debug, PartialEq)]
pub struct TopicBinding {
    pub address: Address,
    pub topic: String,
}

#[derive(Clone, Debug, Default)]
pub struct TopicTable {
    bindings: Vec<TopicBinding>,
}

#[derive(Deserialize)]
#[serde(try_from = "String")]
struct RomCode(Address);

impl TryFrom<String> for RomCode {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        parse_rom(&s).map(RomCode)
    }
}

// JSON object entries in document order, repeated keys included
struct Entries(Vec<(String, RomCode)>);

impl<'de> Deserialize<'de> for Entries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Entries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of topic -> ROM code")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Entries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry()? {
                    entries.push(entry);
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

impl TopicTable {
    pub fn new(bindings: Vec<TopicBinding>) -> anyhow::Result<Self> {
        for (i, b) in bindings.iter().enumerate() {
            if b.topic.is_empty() {
                bail!("Empty topic for sensor {}", rom_hex(&b.address));
            }
            if bindings[..i].iter().any(|prev| prev.address == b.address) {
                bail!("Sensor {} bound to more than one topic", rom_hex(&b.address));
            }
        }
        Ok(TopicTable { bindings })
    }

    /// Parse `{"topic": "<rom hex>", ...}`.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let Entries(entries) =
            serde_json::from_str::<Entries>(json).context("Cannot parse sensor topic table")?;
        let mut bindings: Vec<TopicBinding> = Vec::with_capacity(entries.len());
        for (topic, rom) in entries {
            if bindings.iter().any(|b| b.topic == topic) {
                bail!("Topic {topic:?} listed more than once");
            }
            bindings.push(TopicBinding {
                address: rom.0,
                topic,
            });
        }
        Self::new(bindings)
    }

    pub fn resolve(&self, address: &Address) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.address == *address)
            .map(|b| b.topic.as_str())
    }

    pub fn is_known(&self, address: &Address) -> bool {
        self.resolve(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopicBinding> {
        self.bindings.iter()
    }
}


// EOF
