// Storage collaborator contract shared by every backend

pub mod storage;
