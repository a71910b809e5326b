use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use ridetrack_core::repository::StoreResult;
use ridetrack_core::{CapacityRecord, CapacityStore, StoreError, VehicleType};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

// Create-if-absent, all fields in one step.
const INSERT_SCRIPT: &str = r#"
    if redis.call("EXISTS", KEYS[1]) == 1 then
        return 0
    end
    redis.call("HSET", KEYS[1],
        "vehicle_type", ARGV[1], "capacity", ARGV[2], "online", ARGV[3], "offline", ARGV[4],
        "available", ARGV[5], "is_active", ARGV[6], "last_seat_update", ARGV[7], "version", ARGV[8])
    return 1
"#;

// Version-checked write. -1: key missing, 0: version moved, 1: committed.
const CAS_SCRIPT: &str = r#"
    local current = redis.call("HGET", KEYS[1], "version")
    if not current then
        return -1
    end
    if current ~= ARGV[1] then
        return 0
    end
    redis.call("HSET", KEYS[1],
        "vehicle_type", ARGV[2], "capacity", ARGV[3], "online", ARGV[4], "offline", ARGV[5],
        "available", ARGV[6], "is_active", ARGV[7], "last_seat_update", ARGV[8], "version", ARGV[9])
    return 1
"#;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)
    }
}

/// Vehicle seat counters kept in one Redis hash per vehicle.
///
/// Writes go through Lua scripts so the version check and the field update
/// execute as one atomic step on the server.
#[derive(Clone)]
pub struct RedisCapacityStore {
    redis: RedisClient,
}

impl RedisCapacityStore {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CapacityStore for RedisCapacityStore {
    async fn get(&self, vehicle_id: Uuid) -> StoreResult<Option<CapacityRecord>> {
        let mut conn = self.redis.connection().await?;
        let fields: HashMap<String, String> = conn.hgetall(vehicle_key(vehicle_id)).await.map_err(backend)?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode_record(vehicle_id, &fields).map(Some)
    }

    async fn insert(&self, record: &CapacityRecord) -> StoreResult<()> {
        let mut conn = self.redis.connection().await?;
        let script = redis::Script::new(INSERT_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation.key(vehicle_key(record.id));
        for value in encode_record(record) {
            invocation.arg(value);
        }
        let created: i64 = invocation.invoke_async(&mut conn).await.map_err(backend)?;
        if created == 0 {
            return Err(StoreError::Duplicate(record.id.to_string()));
        }
        info!("Vehicle {} registered with {} seats", record.id, record.capacity);
        Ok(())
    }

    async fn compare_and_swap(&self, expected_version: u64, next: &CapacityRecord) -> StoreResult<bool> {
        let mut conn = self.redis.connection().await?;
        let script = redis::Script::new(CAS_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation.key(vehicle_key(next.id));
        invocation.arg(expected_version.to_string());
        for value in encode_record(next) {
            invocation.arg(value);
        }
        let outcome: i64 = invocation.invoke_async(&mut conn).await.map_err(backend)?;
        match outcome {
            1 => Ok(true),
            0 => Ok(false),
            _ => Err(StoreError::Backend(format!("vehicle {} vanished during update", next.id))),
        }
    }
}

fn backend(e: redis::RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn vehicle_key(vehicle_id: Uuid) -> String {
    format!("vehicle:{}:seats", vehicle_id)
}

/// Field values in script argument order.
fn encode_record(record: &CapacityRecord) -> Vec<String> {
    vec![
        record.vehicle_type.as_str().to_string(),
        record.capacity.to_string(),
        record.online_booked_seats.to_string(),
        record.offline_occupied_seats.to_string(),
        record.available_seats.to_string(),
        if record.is_active { "1" } else { "0" }.to_string(),
        record.last_seat_update.to_rfc3339(),
        record.version.to_string(),
    ]
}

fn decode_record(id: Uuid, fields: &HashMap<String, String>) -> StoreResult<CapacityRecord> {
    let last_seat_update = DateTime::parse_from_rfc3339(raw(id, fields, "last_seat_update")?)
        .map_err(|e| corrupt(id, format!("last_seat_update: {}", e)))?
        .with_timezone(&Utc);

    Ok(CapacityRecord {
        id,
        vehicle_type: parse::<VehicleType>(id, fields, "vehicle_type")?,
        capacity: parse(id, fields, "capacity")?,
        online_booked_seats: parse(id, fields, "online")?,
        offline_occupied_seats: parse(id, fields, "offline")?,
        available_seats: parse(id, fields, "available")?,
        is_active: raw(id, fields, "is_active")? == "1",
        last_seat_update,
        version: parse(id, fields, "version")?,
    })
}

fn raw<'a>(id: Uuid, fields: &'a HashMap<String, String>, name: &str) -> StoreResult<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| corrupt(id, format!("missing field {}", name)))
}

fn parse<T>(id: Uuid, fields: &HashMap<String, String>, name: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw(id, fields, name)?
        .parse()
        .map_err(|e: T::Err| corrupt(id, format!("{}: {}", name, e)))
}

fn corrupt(id: Uuid, reason: String) -> StoreError {
    StoreError::Corrupt { key: vehicle_key(id), reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELD_NAMES: [&str; 8] = [
        "vehicle_type",
        "capacity",
        "online",
        "offline",
        "available",
        "is_active",
        "last_seat_update",
        "version",
    ];

    fn as_hash(record: &CapacityRecord) -> HashMap<String, String> {
        FIELD_NAMES
            .iter()
            .map(|name| name.to_string())
            .zip(encode_record(record))
            .collect()
    }

    #[test]
    fn test_hash_fields_decode_to_same_record() {
        let record = CapacityRecord::new(Uuid::new_v4(), VehicleType::Minibus, 18, Utc::now())
            .next(5, 2, Utc::now());
        let decoded = decode_record(record.id, &as_hash(&record)).unwrap();

        assert_eq!(decoded.online_booked_seats, 5);
        assert_eq!(decoded.offline_occupied_seats, 2);
        assert_eq!(decoded.available_seats, 11);
        assert_eq!(decoded.version, 1);
        assert_eq!(decoded.vehicle_type, VehicleType::Minibus);
        assert!(decoded.is_active);
    }

    #[test]
    fn test_missing_field_is_reported_as_corrupt() {
        let record = CapacityRecord::new(Uuid::new_v4(), VehicleType::Bus, 40, Utc::now());
        let mut fields = as_hash(&record);
        fields.remove("version");

        match decode_record(record.id, &fields) {
            Err(StoreError::Corrupt { key, reason }) => {
                assert_eq!(key, format!("vehicle:{}:seats", record.id));
                assert!(reason.contains("version"));
            }
            other => panic!("expected corrupt record, got {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_counter_is_reported_as_corrupt() {
        let record = CapacityRecord::new(Uuid::new_v4(), VehicleType::Bus, 40, Utc::now());
        let mut fields = as_hash(&record);
        fields.insert("online".to_string(), "-3".to_string());
        assert!(matches!(decode_record(record.id, &fields), Err(StoreError::Corrupt { .. })));
    }
}
