//! End-to-end repository flow against an in-memory database.

use core_library::db::{create_pool, create_test_pool, DatabaseConfig};
use core_library::duration::format_duration_ms;
use core_library::models::{Library, Playlist, Track, User};
use core_library::ordering::is_contiguous;
use core_library::repositories::*;
use core_library::PageRequest;

#[tokio::test]
async fn import_then_curate_a_playlist() {
    let pool = create_test_pool().await.unwrap();
    let users = SqliteUserRepository::new(pool.clone());
    let libraries = SqliteLibraryRepository::new(pool.clone());
    let artists = SqliteArtistRepository::new(pool.clone());
    let albums = SqliteAlbumRepository::new(pool.clone());
    let tracks = SqliteTrackRepository::new(pool.clone());
    let playlists = SqlitePlaylistRepository::new(pool.clone());

    let user = User::new("mara".to_string(), Some("mara@example.com".to_string()));
    users.insert(&user).await.unwrap();
    let library = Library::new(user.id.clone(), "Vinyl rips".to_string(), "/rips".to_string());
    libraries.insert(&library).await.unwrap();

    let (artist, _) = artists
        .find_or_create(&library.id, "Nina Simone")
        .await
        .unwrap();
    let (album, _) = albums
        .find_or_create(&artist.id, "Pastel Blues", Some(1965))
        .await
        .unwrap();

    let mut imported = Vec::new();
    for (number, (title, ms)) in [("Be My Husband", 163_000), ("Sinnerman", 622_000)]
        .into_iter()
        .enumerate()
    {
        let mut track = Track::new(
            album.id.clone(),
            title.to_string(),
            format!("/rips/{number}.flac"),
            "flac".to_string(),
        );
        track.track_number = Some(number as i32 + 1);
        track.duration_ms = ms;
        let (stored, created) = tracks.upsert(&track).await.unwrap();
        assert!(created);
        imported.push(stored);
    }

    let album = albums.find_by_id(&album.id).await.unwrap().unwrap();
    assert_eq!(album.track_count, 2);
    assert_eq!(format_duration_ms(album.total_duration_ms), "13:05");

    let playlist = Playlist::new(library.id.clone(), "Late night".to_string());
    playlists.insert(&playlist).await.unwrap();
    for track in imported.iter().rev() {
        playlists.add_track(&playlist.id, &track.id).await.unwrap();
    }
    playlists.move_item(&playlist.id, 1, 0).await.unwrap();

    let ordered: Vec<String> = playlists
        .tracks(&playlist.id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(ordered, vec!["Be My Husband", "Sinnerman"]);
    assert!(is_contiguous(&playlists.items(&playlist.id).await.unwrap()));

    let found = tracks
        .search(&library.id, "simone", PageRequest::default())
        .await
        .unwrap();
    assert_eq!(found.total, 2);

    // Removing the user removes everything beneath it.
    assert!(users.delete(&user.id).await.unwrap());
    assert_eq!(tracks.count(&library.id).await.unwrap(), 0);
    assert!(playlists.find_by_id(&playlist.id).await.unwrap().is_none());
}

#[tokio::test]
async fn libraries_over_one_folder_keep_their_own_tracks() {
    let pool = create_test_pool().await.unwrap();
    let users = SqliteUserRepository::new(pool.clone());
    let libraries = SqliteLibraryRepository::new(pool.clone());
    let artists = SqliteArtistRepository::new(pool.clone());
    let albums = SqliteAlbumRepository::new(pool.clone());
    let tracks = SqliteTrackRepository::new(pool.clone());

    let mut owned = Vec::new();
    for name in ["alice", "bob"] {
        let user = User::new(name.to_string(), None);
        users.insert(&user).await.unwrap();
        let library = Library::new(user.id.clone(), "Music".to_string(), "/shared/Music".to_string());
        libraries.insert(&library).await.unwrap();

        let (artist, _) = artists.find_or_create(&library.id, "Unknown Artist").await.unwrap();
        let (album, _) = albums.find_or_create(&artist.id, "Unknown Album", None).await.unwrap();
        let mut track = Track::new(
            album.id.clone(),
            "song".to_string(),
            "/shared/Music/song.wav".to_string(),
            "wav".to_string(),
        );
        track.duration_ms = 1_000;

        let (stored, created) = tracks.upsert(&track).await.unwrap();
        assert!(created, "{name} should get its own track row");
        owned.push((library, album, stored));
    }

    let (alice, bob) = (&owned[0], &owned[1]);
    assert_ne!(alice.2.id, bob.2.id);
    for (library, album, track) in &owned {
        assert_eq!(tracks.count(&library.id).await.unwrap(), 1);
        let album = albums.find_by_id(&album.id).await.unwrap().unwrap();
        assert_eq!(album.track_count, 1);
        let found = tracks
            .find_by_path(&library.id, "/shared/Music/song.wav")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, track.id);
    }
}

#[tokio::test]
async fn concurrent_find_or_create_yields_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let pool = create_pool(DatabaseConfig::new(dir.path().join("library.db")))
        .await
        .unwrap();

    let user = User::new("ines".to_string(), None);
    SqliteUserRepository::new(pool.clone()).insert(&user).await.unwrap();
    let library = Library::new(user.id.clone(), "Main".to_string(), "/music".to_string());
    SqliteLibraryRepository::new(pool.clone())
        .insert(&library)
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let library_id = library.id.clone();
        tasks.push(tokio::spawn(async move {
            let artists = SqliteArtistRepository::new(pool.clone());
            let (artist, _) = artists.find_or_create(&library_id, "Alice Coltrane").await?;
            let albums = SqliteAlbumRepository::new(pool);
            let (album, _) = albums
                .find_or_create(&artist.id, "Journey in Satchidananda", Some(1971))
                .await?;
            Ok::<_, core_library::LibraryError>((artist.id, album.id))
        }));
    }

    let mut created = Vec::new();
    for task in tasks {
        created.push(task.await.unwrap().unwrap());
    }
    assert!(created.windows(2).all(|pair| pair[0] == pair[1]));

    let artists = SqliteArtistRepository::new(pool.clone());
    assert_eq!(artists.count(&library.id).await.unwrap(), 1);
    let albums = SqliteAlbumRepository::new(pool);
    let page = albums
        .query_by_library(&library.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}
