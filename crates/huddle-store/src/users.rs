//! User records: sign-in lookups, the directory of other users, and demo
//! seeding.

use rusqlite::{params, Connection, OptionalExtension};

use huddle_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;
use crate::sql::{now, ts_from_sql, ts_to_sql, uuid_from_sql};

const USER_COLUMNS: &str = "id, name, email, image, is_anonymous, created_at";

/// Demo accounts inserted by [`Database::seed_test_users`]: (name, email, image).
const TEST_USERS: [(&str, &str, &str); 2] = [
    (
        "Maicon",
        "maicon@test.com",
        "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?w=150&h=150&fit=crop&crop=face",
    ),
    (
        "Giovana",
        "giovana@test.com",
        "https://images.unsplash.com/photo-1494790108755-2616b612b786?w=150&h=150&fit=crop&crop=face",
    ),
];

/// Fields of a user that does not exist yet.
#[derive(Debug, Clone, Default)]
pub struct NewUser<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub image: Option<&'a str>,
    pub is_anonymous: bool,
}

impl Database {
    pub fn create_user(&self, new: &NewUser<'_>) -> Result<User> {
        insert_user(self.conn(), new)
    }

    pub fn find_user(&self, id: &UserId) -> Result<Option<User>> {
        load_user(self.conn(), id)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        load_user_by_email(self.conn(), email.trim())
    }

    /// Return the user registered under `email`, creating it first if needed.
    /// An existing user keeps its name.
    pub fn find_or_create_user(&mut self, email: &str, name: Option<&str>) -> Result<User> {
        let email = checked_email(email)?;

        let tx = self.write_tx()?;
        let user = match load_user_by_email(&tx, email)? {
            Some(user) => user,
            None => insert_registered(&tx, email, name)?,
        };
        tx.commit()?;
        Ok(user)
    }

    /// Register a new account under `email`.  An email that already belongs
    /// to someone is refused with [`StoreError::EmailTaken`].
    pub fn register_user(&mut self, email: &str, name: Option<&str>) -> Result<User> {
        let email = checked_email(email)?;

        let tx = self.write_tx()?;
        if load_user_by_email(&tx, email)?.is_some() {
            return Err(StoreError::EmailTaken);
        }
        let user = insert_registered(&tx, email, name)?;
        tx.commit()?;
        Ok(user)
    }

    /// Every user except `caller`, ordered by display name.
    pub fn list_users_except(&self, caller: &UserId) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE id != ?1
             ORDER BY COALESCE(name, email, '') COLLATE NOCASE ASC, created_at ASC"
        ))?;
        let rows = stmt.query_map(params![caller.to_string()], row_to_user)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Insert the demo accounts that are not present yet.  Returns only the
    /// users created by this call.
    pub fn seed_test_users(&mut self) -> Result<Vec<User>> {
        let tx = self.write_tx()?;
        let mut created = Vec::new();

        for (name, email, image) in TEST_USERS {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                params![email],
                |row| row.get(0),
            )?;
            if exists {
                continue;
            }
            created.push(insert_user(
                &tx,
                &NewUser {
                    name: Some(name),
                    email: Some(email),
                    image: Some(image),
                    is_anonymous: false,
                },
            )?);
        }

        tx.commit()?;
        tracing::info!(created = created.len(), "seeded test users");
        Ok(created)
    }
}

pub(crate) fn insert_user(conn: &Connection, new: &NewUser<'_>) -> Result<User> {
    let user = User {
        id: UserId::new(),
        name: new.name.map(str::to_string),
        email: new.email.map(str::to_string),
        image: new.image.map(str::to_string),
        is_anonymous: new.is_anonymous,
        created_at: now(),
    };

    conn.execute(
        "INSERT INTO users (id, name, email, image, is_anonymous, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id.to_string(),
            user.name,
            user.email,
            user.image,
            user.is_anonymous as i32,
            ts_to_sql(&user.created_at),
        ],
    )?;
    Ok(user)
}

pub(crate) fn load_user(conn: &Connection, id: &UserId) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.to_string()],
            row_to_user,
        )
        .optional()?)
}

fn load_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            row_to_user,
        )
        .optional()?)
}

fn checked_email(email: &str) -> Result<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(StoreError::Invalid("email must not be empty".into()));
    }
    Ok(email)
}

fn insert_registered(conn: &Connection, email: &str, name: Option<&str>) -> Result<User> {
    let user = insert_user(
        conn,
        &NewUser {
            name,
            email: Some(email),
            ..Default::default()
        },
    )?;
    tracing::info!(user = %user.id, "registered user");
    Ok(user)
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let is_anonymous: i32 = row.get(4)?;
    let created_str: String = row.get(5)?;

    Ok(User {
        id: UserId(uuid_from_sql(0, &id_str)?),
        name: row.get(1)?,
        email: row.get(2)?,
        image: row.get(3)?,
        is_anonymous: is_anonymous != 0,
        created_at: ts_from_sql(5, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_or_create_is_stable_per_email() {
        let mut db = Database::open_in_memory().unwrap();

        let first = db.find_or_create_user("ana@example.com", Some("Ana")).unwrap();
        let again = db.find_or_create_user(" ana@example.com ", Some("Other")).unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(again.name.as_deref(), Some("Ana"));
        assert_eq!(db.find_user(&first.id).unwrap(), Some(first));
    }

    #[test]
    fn register_refuses_existing_email() {
        let mut db = Database::open_in_memory().unwrap();
        let ana = db.register_user("ana@example.com", Some("Ana")).unwrap();

        assert!(matches!(
            db.register_user(" ana@example.com", Some("Mallory")),
            Err(StoreError::EmailTaken)
        ));
        assert_eq!(db.find_user_by_email("ana@example.com").unwrap(), Some(ana));
    }

    #[test]
    fn blank_email_is_invalid() {
        let mut db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.find_or_create_user("  ", None),
            Err(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn listing_excludes_caller() {
        let mut db = Database::open_in_memory().unwrap();
        let zoe = db.find_or_create_user("zoe@example.com", Some("zoe")).unwrap();
        let bob = db.find_or_create_user("bob@example.com", Some("Bob")).unwrap();
        let me = db.find_or_create_user("me@example.com", Some("Me")).unwrap();

        let names: Vec<_> = db
            .list_users_except(&me.id)
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(names, vec![bob.id, zoe.id]);
    }

    #[test]
    fn seeding_twice_creates_once() {
        let mut db = Database::open_in_memory().unwrap();
        assert_eq!(db.seed_test_users().unwrap().len(), 2);
        assert!(db.seed_test_users().unwrap().is_empty());
        assert!(db.find_user_by_email("giovana@test.com").unwrap().is_some());
    }

    #[test]
    fn label_prefers_name_then_email() {
        let db = Database::open_in_memory().unwrap();
        let named = db
            .create_user(&NewUser {
                name: Some("Ana"),
                email: Some("ana@example.com"),
                ..Default::default()
            })
            .unwrap();
        let unnamed = db
            .create_user(&NewUser {
                email: Some("x@example.com"),
                ..Default::default()
            })
            .unwrap();
        let anonymous = db
            .create_user(&NewUser {
                is_anonymous: true,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(named.label(), Some("Ana"));
        assert_eq!(unnamed.label(), Some("x@example.com"));
        assert_eq!(anonymous.label(), None);
    }
}
