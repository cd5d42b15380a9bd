//! Walks through the adapters on a small address book schema.
//!
//! Run with `RUST_LOG=trace` to see registry and transient events.

use protomap::schema::{EnumDescriptor, MessageDescriptor, ScalarType};
use protomap::{ByteBlob, Editable, ProtoMap, Registry, TransientCollection, Value};

fn format_value(v: &Value) -> String {
    match v {
        Value::Nil => "nil".to_string(),
        Value::Str(s) => {
            let preview: String = s.chars().take(40).collect();
            if s.len() > 40 {
                format!("\"{}...\"", preview)
            } else {
                format!("\"{}\"", preview)
            }
        }
        Value::Enum(name) => format!(":{}", name),
        Value::EnumNumber(n) => format!("ENUM({})", n),
        Value::Bytes(b) => format!("BYTES[{}]", b.len()),
        Value::Message(m) => format!("{}{{{} fields}}", m.descriptor().name(), m.len()),
        Value::Vector(v) => {
            let items: Vec<String> = v.iter().map(|item| format_value(&item)).collect();
            format!("[{}]", items.join(", "))
        }
        other => format!("{:?}", other),
    }
}

fn print_map(title: &str, map: &ProtoMap) {
    println!("\n=== {} ===", title);
    for (key, value) in map.entries() {
        println!("  {:<10} {}", key, format_value(&value));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt::try_init();

    let mood = EnumDescriptor::new("book.Mood", [("NEUTRAL", 0), ("HAPPY", 1), ("SAD", 2)])?;
    let address = MessageDescriptor::builder("book.Address")
        .field("street", 1, ScalarType::String)
        .field("city", 2, ScalarType::String)
        .build()?;
    let person = MessageDescriptor::builder("book.Person")
        .field("name", 1, ScalarType::String)
        .field("age", 2, ScalarType::Int32)
        .field("mood", 3, &mood)
        .field("address", 4, &address)
        .repeated("scores", 5, ScalarType::Int64)
        .field("avatar", 6, ScalarType::Bytes)
        .oneof("contact", |o| {
            o.field("phone", 7, ScalarType::String)
                .field("handle", 8, ScalarType::String)
        })
        .build()?;

    let registry = Registry::new("book").with(&person);
    println!("Registered: {}", registry.message_names().join(", "));

    let alice = registry
        .empty("Person")?
        .assoc("name", "Alice")?
        .assoc("age", 30)?
        .assoc("mood", Value::keyword("HAPPY"))?
        .assoc(
            "address",
            Value::map([
                ("street", Value::from("1 Main St")),
                ("city", Value::from("Springfield")),
            ]),
        )?
        .assoc("scores", Value::list([90i64, 85, 77]))?
        .assoc("avatar", ByteBlob::from([0x89u8, 0x50, 0x4e, 0x47]))?
        .assoc("handle", "@alice")?;
    print_map("Alice", &alice);
    println!("contact set via: {:?}", alice.which_one_of("contact")?);

    // Switching oneof member clears the previous one
    let reachable = alice.assoc("phone", "555-0100")?;
    println!("after phone: handle = {}", format_value(&reachable.get_or("handle", Value::Nil)));

    let bytes = alice.to_bytes();
    println!("\nEncoded: {} bytes", bytes.len());
    let decoded = registry.from_bytes("book.Person", bytes)?;
    println!("Round trip equal: {}", decoded == alice);

    if let Some(Value::Vector(scores)) = alice.get("scores") {
        let more = scores.cons(100i64)?.assoc_n(0, 95i64)?;
        println!("\n=== Scores ===");
        println!("  original: {}", format_value(&Value::Vector(scores.clone())));
        println!("  edited:   {}", format_value(&Value::Vector(more.clone())));

        let mut t = more.as_transient();
        t.push(60i64)?.push(65i64)?;
        let batched = t.persistent()?;
        println!("  batched:  {} items", batched.len());
    }

    if let Some(Value::Bytes(avatar)) = alice.get("avatar") {
        let prefixed = avatar.cons(0xff);
        let rest = avatar.view(1)?;
        println!("\n=== Avatar ===");
        println!("  bytes:    {:?}", avatar);
        println!("  cons:     {:?}", prefixed);
        println!("  view(1):  {:?}", rest);
        println!("  shares storage: {}", rest.shares_storage_with(&avatar));
    }

    let mut t = alice.as_transient();
    t.assoc("age", 31)?.assoc("mood", Value::keyword("NEUTRAL"))?;
    let older = t.persistent()?;
    print_map("Alice, a year later", &older);

    if let Err(err) = alice.assoc("age", "thirty") {
        println!("\nRejected write: {}", err);
    }

    Ok(())
}
