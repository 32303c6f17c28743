use crate::model::*;
use sled::transaction::{
    ConflictableTransactionResult, TransactionError, Transactional, TransactionalTree,
};
use std::convert::TryFrom;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("corrupt id of {0} bytes")]
    CorruptId(usize),
    #[error("transaction aborted")]
    Aborted,
}

pub type DbResult<T> = Result<T, DbError>;

type TxResult = ConflictableTransactionResult<(), ()>;

// Big endian, so that iterating a tree yields ids in the order they were generated.
fn serialize_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> DbResult<u64> {
    let bytes = id.as_ref();
    <[u8; 8]>::try_from(bytes)
        .map(u64::from_be_bytes)
        .map_err(|_| DbError::CorruptId(bytes.len()))
}

fn user_movie_key(user_id: u64, movie_id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&serialize_id(user_id));
    key[8..].copy_from_slice(&serialize_id(movie_id));
    key
}

fn name_key(name: &str) -> String {
    name.to_lowercase()
}

fn owned_movie_keys(user_movies: &sled::Tree, user_id: u64) -> DbResult<Vec<sled::IVec>> {
    Ok(user_movies
        .scan_prefix(serialize_id(user_id))
        .keys()
        .collect::<sled::Result<Vec<_>>>()?)
}

fn remove_movies(
    movies: &TransactionalTree,
    user_movies: &TransactionalTree,
    keys: &[sled::IVec],
) -> TxResult {
    for key in keys {
        movies.remove(&key[8..])?;
        user_movies.remove(&key[..])?;
    }
    Ok(())
}

fn sweep_user_movies(
    movies: &sled::Tree,
    user_movies: &sled::Tree,
    user_id: u64,
) -> DbResult<usize> {
    let keys = owned_movie_keys(user_movies, user_id)?;
    if !keys.is_empty() {
        (movies, user_movies)
            .transaction(|(movies, user_movies)| remove_movies(movies, user_movies, &keys))
            .map_err(storage_error)?;
    }
    Ok(keys.len())
}

fn storage_error(err: TransactionError<()>) -> DbError {
    match err {
        TransactionError::Storage(e) => DbError::Storage(e),
        TransactionError::Abort(()) => DbError::Aborted,
    }
}

pub trait UserDb {
    type Error;
    /// Returns `None` if a user with the same name (ignoring case) exists.
    fn add_user(&self, user: &User) -> Result<Option<u64>, Self::Error>;
    fn get_user(&self, id: u64) -> Result<Option<User>, Self::Error>;
    fn get_all_users(&self) -> Result<Vec<Record<User>>, Self::Error>;
    /// Removes the user and every movie they own.
    ///
    /// Adding a movie checks for its owner inside the same transaction that
    /// writes it, so once the user record is gone no movie can be added for
    /// them. Movies added between collecting the owned set and removing the
    /// user are swept up in a second pass.
    fn delete_user(&self, id: u64) -> Result<bool, Self::Error>;
}

pub trait MovieDb {
    type Error;
    /// Returns `None` if the owning user does not exist.
    fn add_movie(&self, movie: &Movie) -> Result<Option<u64>, Self::Error>;
    fn get_movie(&self, id: u64) -> Result<Option<Movie>, Self::Error>;
    fn get_user_movies(&self, user_id: u64) -> Result<Vec<Record<Movie>>, Self::Error>;
    fn update_movie(&self, id: u64, movie: &Movie) -> Result<bool, Self::Error>;
    fn delete_movie(&self, id: u64) -> Result<bool, Self::Error>;
}

const USERS: &[u8] = b"users";
const USERS_NAME: &[u8] = b"users_name";
const MOVIES: &[u8] = b"movies";
const USER_MOVIES: &[u8] = b"user_movies";

impl UserDb for sled::Db {
    type Error = DbError;

    fn add_user(&self, user: &User) -> DbResult<Option<u64>> {
        let users = self.open_tree(USERS)?;
        let users_name = self.open_tree(USERS_NAME)?;
        let id = self.generate_id()?;
        let data = bincode::serialize(user)?;
        let name = name_key(&user.name);
        if let Err(err) = (&users, &users_name).transaction(
            |(users, users_name)| -> TxResult {
                if users_name.insert(name.as_bytes(), &serialize_id(id))?.is_some() {
                    return sled::transaction::abort(());
                }
                users.insert(&serialize_id(id), data.as_slice())?;
                Ok(())
            },
        ) {
            match err {
                TransactionError::Storage(e) => return Err(e.into()),
                TransactionError::Abort(()) => return Ok(None),
            };
        }
        Ok(Some(id))
    }

    fn get_user(&self, id: u64) -> DbResult<Option<User>> {
        let users = self.open_tree(USERS)?;
        match users.get(serialize_id(id))? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    fn get_all_users(&self) -> DbResult<Vec<Record<User>>> {
        let users = self.open_tree(USERS)?;
        users
            .iter()
            .map(|entry| -> DbResult<Record<User>> {
                let (id, data) = entry?;
                Ok(Record {
                    id: deserialize_id(id)?,
                    value: bincode::deserialize(&data)?,
                })
            })
            .collect()
    }

    fn delete_user(&self, id: u64) -> DbResult<bool> {
        let user = match self.get_user(id)? {
            Some(user) => user,
            None => return Ok(false),
        };
        let users = self.open_tree(USERS)?;
        let users_name = self.open_tree(USERS_NAME)?;
        let movies = self.open_tree(MOVIES)?;
        let user_movies = self.open_tree(USER_MOVIES)?;
        let owned = owned_movie_keys(&user_movies, id)?;
        let name = name_key(&user.name);
        (&users, &users_name, &movies, &user_movies)
            .transaction(|(users, users_name, movies, user_movies)| -> TxResult {
                users.remove(&serialize_id(id))?;
                users_name.remove(name.as_bytes())?;
                remove_movies(movies, user_movies, &owned)
            })
            .map_err(storage_error)?;

        let late = sweep_user_movies(&movies, &user_movies, id)?;
        if late > 0 {
            log::warn!("Removed {} movies added while deleting user {}", late, id);
        }
        Ok(true)
    }
}

impl MovieDb for sled::Db {
    type Error = DbError;

    fn add_movie(&self, movie: &Movie) -> DbResult<Option<u64>> {
        let users = self.open_tree(USERS)?;
        let movies = self.open_tree(MOVIES)?;
        let user_movies = self.open_tree(USER_MOVIES)?;
        let id = self.generate_id()?;
        let data = bincode::serialize(movie)?;
        let index_key = user_movie_key(movie.user_id, id);
        if let Err(err) = (&users, &movies, &user_movies).transaction(
            |(users, movies, user_movies)| -> TxResult {
                if users.get(&serialize_id(movie.user_id))?.is_none() {
                    return sled::transaction::abort(());
                }
                movies.insert(&serialize_id(id), data.as_slice())?;
                user_movies.insert(&index_key[..], &b""[..])?;
                Ok(())
            },
        ) {
            match err {
                TransactionError::Storage(e) => return Err(e.into()),
                TransactionError::Abort(()) => return Ok(None),
            };
        }
        Ok(Some(id))
    }

    fn get_movie(&self, id: u64) -> DbResult<Option<Movie>> {
        let movies = self.open_tree(MOVIES)?;
        match movies.get(serialize_id(id))? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    fn get_user_movies(&self, user_id: u64) -> DbResult<Vec<Record<Movie>>> {
        let movies = self.open_tree(MOVIES)?;
        let user_movies = self.open_tree(USER_MOVIES)?;
        let mut ret = Vec::new();
        for key in user_movies.scan_prefix(serialize_id(user_id)).keys() {
            let key = key?;
            let movie_id = deserialize_id(&key[8..])?;
            if let Some(data) = movies.get(serialize_id(movie_id))? {
                ret.push(Record {
                    id: movie_id,
                    value: bincode::deserialize(&data)?,
                });
            } else {
                log::warn!("Dangling movie index entry {} for user {}", movie_id, user_id);
            }
        }
        Ok(ret)
    }

    fn update_movie(&self, id: u64, movie: &Movie) -> DbResult<bool> {
        let movies = self.open_tree(MOVIES)?;
        if !movies.contains_key(serialize_id(id))? {
            return Ok(false);
        }
        movies.insert(serialize_id(id), bincode::serialize(movie)?)?;
        Ok(true)
    }

    fn delete_movie(&self, id: u64) -> DbResult<bool> {
        let movie = match self.get_movie(id)? {
            Some(movie) => movie,
            None => return Ok(false),
        };
        let movies = self.open_tree(MOVIES)?;
        let user_movies = self.open_tree(USER_MOVIES)?;
        let index_key = user_movie_key(movie.user_id, id);
        (&movies, &user_movies)
            .transaction(|(movies, user_movies)| -> TxResult {
                movies.remove(&serialize_id(id))?;
                user_movies.remove(&index_key[..])?;
                Ok(())
            })
            .map_err(storage_error)?;
        Ok(true)
    }
}
