mod sector_file;


pub use self::sector_file::SectorFile;
