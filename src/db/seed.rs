use rusqlite::params;
use serde::Deserialize;

use crate::auth::password;
use crate::config::Config;
use crate::state::DbPool;

#[derive(Debug, Deserialize)]
struct SeedMember {
    username: String,
    known_as: String,
    gender: String,
    date_of_birth: String,
    city: String,
    country: String,
    introduction: String,
    looking_for: String,
    interests: String,
    photo_url: String,
}

const SEED_MEMBERS: &str = include_str!("../../seed/users.json");

/// Populates an empty database with demo members plus an admin account.
/// Does nothing when any user already exists or seeding is disabled.
pub fn run(pool: &DbPool, config: &Config) -> anyhow::Result<()> {
    if !config.seed.demo_members {
        return Ok(());
    }

    let conn = pool.get()?;
    let user_count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    if user_count > 0 {
        return Ok(());
    }

    let members: Vec<SeedMember> = serde_json::from_str(SEED_MEMBERS)?;
    // All demo accounts share one password, so hash it once.
    let password_hash = password::hash_password(&config.seed.password)?;

    conn.execute("BEGIN IMMEDIATE", [])?;
    let result = (|| -> anyhow::Result<()> {
        for member in &members {
            let user_id = uuid::Uuid::now_v7().to_string();
            conn.execute(
                "INSERT INTO users (id, username, password_hash, known_as, gender,
                                    date_of_birth, city, country, introduction,
                                    looking_for, interests)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    user_id,
                    member.username,
                    password_hash,
                    member.known_as,
                    member.gender,
                    member.date_of_birth,
                    member.city,
                    member.country,
                    member.introduction,
                    member.looking_for,
                    member.interests,
                ],
            )?;
            conn.execute(
                "INSERT INTO user_roles (user_id, role_id)
                 SELECT ?1, id FROM roles WHERE name = 'Member'",
                params![user_id],
            )?;
            conn.execute(
                "INSERT INTO photos (id, user_id, url, is_main, is_approved)
                 VALUES (?1, ?2, ?3, 1, 1)",
                params![uuid::Uuid::now_v7().to_string(), user_id, member.photo_url],
            )?;
        }

        let admin_id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO users (id, username, password_hash, known_as, gender,
                                date_of_birth, city, country)
             VALUES (?1, 'admin', ?2, 'Admin', 'other', '1980-01-01', 'Unknown', 'Unknown')",
            params![admin_id, password_hash],
        )?;
        conn.execute(
            "INSERT INTO user_roles (user_id, role_id)
             SELECT ?1, id FROM roles WHERE name IN ('Admin', 'Moderator')",
            params![admin_id],
        )?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute("COMMIT", [])?;
            tracing::info!("seeded {} demo members and an admin account", members.len());
            Ok(())
        }
        Err(e) => {
            conn.execute("ROLLBACK", []).ok();
            Err(e)
        }
    }
}
